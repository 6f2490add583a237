//! Reference-counted tile cache used while composing a pyramid.

use crate::coord::TileKey;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::Arc;

struct Slot {
    key: TileKey,
    image: Arc<RgbaImage>,
    refs: u32,
}

/// Arena of decoded tiles keyed by `(zoom, coord)`.
///
/// Every entry carries the number of parents still expected to read it.
/// [`consume`](TileCache::consume) decrements that count and evicts the
/// entry when it reaches zero. The cache is owned by a single rebuild and
/// never shared.
#[derive(Default)]
pub struct TileCache {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    index: HashMap<TileKey, usize>,
    peak: usize,
    evicted: usize,
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tile expected to be read `refs` times.
    ///
    /// Replaces any entry with the same key. A zero count is stored as one.
    pub fn insert(&mut self, key: TileKey, image: RgbaImage, refs: u32) {
        self.insert_shared(key, Arc::new(image), refs);
    }

    pub fn insert_shared(&mut self, key: TileKey, image: Arc<RgbaImage>, refs: u32) {
        let slot = Slot {
            key,
            image,
            refs: refs.max(1),
        };
        if let Some(&i) = self.index.get(&key) {
            self.slots[i] = Some(slot);
            return;
        }
        let i = match self.free.pop() {
            Some(i) => {
                self.slots[i] = Some(slot);
                i
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, i);
        self.peak = self.peak.max(self.index.len());
    }

    /// Takes one reference to a tile.
    ///
    /// The entry is evicted once its count reaches zero; the returned handle
    /// is then the only one left.
    pub fn consume(&mut self, key: &TileKey) -> Option<Arc<RgbaImage>> {
        let i = *self.index.get(key)?;
        let slot = self.slots[i].as_mut()?;
        slot.refs -= 1;
        if slot.refs > 0 {
            return Some(Arc::clone(&slot.image));
        }
        let slot = self.slots[i].take()?;
        self.index.remove(key);
        self.free.push(i);
        self.evicted += 1;
        debug_assert_eq!(slot.key, *key);
        Some(slot.image)
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.index.contains_key(key)
    }

    /// Remaining references of a tile.
    pub fn refcount(&self, key: &TileKey) -> Option<u32> {
        let i = *self.index.get(key)?;
        self.slots[i].as_ref().map(|s| s.refs)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Largest number of tiles held at once.
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Number of tiles evicted after their last reference.
    pub fn evicted(&self) -> usize {
        self.evicted
    }

    /// Drops every entry regardless of its count.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
    }
}
