//! Decoded `.hmap` record types.

use crate::coord::{Coord, GRID_PIXELS};
use std::collections::HashMap;

/// Size in bytes of one overlay bitmap (one bit per grid pixel).
pub const OVERLAY_BITMAP_LEN: usize = 1250;

/// A terrain texture referenced by index from a grid's tile array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tileset {
    /// Resource name, e.g. `gfx/tiles/grass`
    pub resource_name: String,
    /// Resource version
    pub version: u16,
    /// Drawing priority
    pub priority: u8,
}

/// A bitpacked overlay layer (claims, villages, provinces).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlay {
    /// Overlay resource name
    pub resource_name: String,
    /// Resource version
    pub version: u16,
    /// One bit per pixel, row-major
    pub bitmap: Vec<u8>,
}

/// One decoded 100×100 terrain grid.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGrid {
    /// Record version
    pub version: u8,
    /// Content identity assigned by the game
    pub grid_id: i64,
    /// Segment the grid belongs to
    pub segment_id: i64,
    /// Last modification time reported by the client
    pub mtime: i64,
    /// Grid coordinate within the segment
    pub coord: Coord,
    /// Tilesets referenced by `tiles`
    pub tilesets: Vec<Tileset>,
    /// Per-pixel tileset index, row-major, `GRID_SIZE` entries
    pub tiles: Vec<u16>,
    /// Per-pixel height, row-major, `GRID_SIZE` entries
    pub zmap: Option<Vec<f32>>,
    /// Overlay layers
    pub overlays: Vec<Overlay>,
}

impl DecodedGrid {
    /// Grid id in the string form used by stored records.
    pub fn id_string(&self) -> String {
        self.grid_id.to_string()
    }

    /// Tileset index at pixel `(x, y)`.
    #[inline]
    pub fn tile_at(&self, x: u32, y: u32) -> Option<u16> {
        self.tiles.get((y * GRID_PIXELS + x) as usize).copied()
    }
}

/// A marker exported alongside the terrain.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMarker {
    /// Player-placed marker
    Player {
        segment_id: i64,
        tile_x: i32,
        tile_y: i32,
        name: String,
        color: [u8; 4],
    },
    /// Game object marker (thingwalls, landmarks)
    Object {
        segment_id: i64,
        tile_x: i32,
        tile_y: i32,
        name: String,
        object_id: i64,
        resource_name: String,
        resource_version: u16,
    },
}

impl DecodedMarker {
    pub fn segment_id(&self) -> i64 {
        match self {
            DecodedMarker::Player { segment_id, .. } | DecodedMarker::Object { segment_id, .. } => {
                *segment_id
            }
        }
    }

    /// Absolute tile coordinate of the marker.
    pub fn tile_coord(&self) -> (i32, i32) {
        match self {
            DecodedMarker::Player { tile_x, tile_y, .. }
            | DecodedMarker::Object { tile_x, tile_y, .. } => (*tile_x, *tile_y),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DecodedMarker::Player { name, .. } | DecodedMarker::Object { name, .. } => name,
        }
    }

    /// Icon resource shown for the marker.
    pub fn image(&self) -> &str {
        match self {
            DecodedMarker::Player { .. } => "gfx/hud/mmap/flag",
            DecodedMarker::Object { resource_name, .. } => resource_name,
        }
    }
}

/// Grids of one export sharing a segment id.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: i64,
    pub grids: Vec<DecodedGrid>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}

/// Counters collected while decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Grid records decoded
    pub grids: usize,
    /// Marker records decoded
    pub markers: usize,
    /// Grid records skipped for an unsupported version
    pub skipped_grids: usize,
    /// Marker records skipped for an unknown kind or version
    pub skipped_markers: usize,
    /// Grids without a usable height field
    pub missing_heights: usize,
    /// Records of unknown type, by type name
    pub unknown_records: HashMap<String, usize>,
}

impl DecodeStats {
    pub fn unknown_record_count(&self) -> usize {
        self.unknown_records.values().sum()
    }
}

/// Fully decoded `.hmap` export.
#[derive(Debug, Clone, Default)]
pub struct HmapFile {
    pub grids: Vec<DecodedGrid>,
    pub markers: Vec<DecodedMarker>,
    pub stats: DecodeStats,
}

impl HmapFile {
    /// Groups grids by segment id, largest segment first.
    ///
    /// Ties are ordered by ascending segment id.
    pub fn segments(&self) -> Vec<Segment> {
        let mut by_id: HashMap<i64, Vec<DecodedGrid>> = HashMap::new();
        for grid in &self.grids {
            by_id.entry(grid.segment_id).or_default().push(grid.clone());
        }
        let mut segments: Vec<Segment> = by_id
            .into_iter()
            .map(|(id, grids)| Segment { id, grids })
            .collect();
        segments.sort_by(|a, b| b.len().cmp(&a.len()).then(a.id.cmp(&b.id)));
        segments
    }

    /// Splits segments into the `n` largest (kept) and the rest (discarded).
    pub fn largest_segments(&self, n: usize) -> (Vec<Segment>, Vec<Segment>) {
        let mut segments = self.segments();
        let discarded = segments.split_off(n.min(segments.len()));
        (segments, discarded)
    }
}
