//! Texture source backed by a directory of PNG files.

use super::source::{PrefetchProgress, TextureSource};
use dashmap::DashMap;
use image::RgbaImage;
use parking_lot::Mutex;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Loads `<root>/<resource name>.png` for each tileset.
///
/// Lookups are cached, including misses, for the lifetime of the source.
pub struct DirectoryTextureSource {
    root: PathBuf,
    cache: Arc<DashMap<String, Option<Arc<RgbaImage>>>>,
    first_error: Arc<Mutex<Option<String>>>,
}

impl DirectoryTextureSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Arc::new(DashMap::new()),
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Inserts a texture directly, bypassing the filesystem.
    pub fn insert(&self, name: &str, image: RgbaImage) {
        self.cache.insert(name.to_string(), Some(Arc::new(image)));
    }

    /// Number of resources looked up so far, loaded or not.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Path of a resource under `root`, or `None` when the name would
    /// leave the root (`..`, absolute paths, drive prefixes).
    fn resource_path(root: &Path, name: &str) -> Option<PathBuf> {
        let relative = PathBuf::from(format!("{}.png", name.trim_start_matches('/')));
        relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
            .then(|| root.join(relative))
    }
}

fn load_texture(path: &Path) -> Result<Option<RgbaImage>, String> {
    match std::fs::read(path) {
        Ok(bytes) => image::load_from_memory(&bytes)
            .map(|img| Some(img.to_rgba8()))
            .map_err(|e| format!("{}: {}", path.display(), e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("{}: {}", path.display(), e)),
    }
}

impl TextureSource for DirectoryTextureSource {
    async fn prefetch(&self, names: &[String], progress: Option<PrefetchProgress>) -> usize {
        let total = names.len();
        let mut loads = JoinSet::new();
        let mut completed = 0;

        for name in names {
            if self.cache.contains_key(name) {
                completed += 1;
                if let Some(cb) = &progress {
                    cb(completed, total, name);
                }
                continue;
            }
            let Some(path) = Self::resource_path(&self.root, name) else {
                warn!(resource = %name, "Texture name leaves the texture root, ignoring");
                self.cache.insert(name.clone(), None);
                completed += 1;
                if let Some(cb) = &progress {
                    cb(completed, total, name);
                }
                continue;
            };
            let name = name.clone();
            loads.spawn_blocking(move || {
                let result = load_texture(&path);
                (name, result)
            });
        }

        while let Some(joined) = loads.join_next().await {
            let (name, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "Texture load task failed");
                    continue;
                }
            };
            let image = match result {
                Ok(Some(img)) => Some(Arc::new(img)),
                Ok(None) => {
                    debug!(resource = %name, "Texture not found");
                    None
                }
                Err(e) => {
                    warn!(resource = %name, error = %e, "Texture fetch failed");
                    self.first_error.lock().get_or_insert(e);
                    None
                }
            };
            self.cache.insert(name.clone(), image);
            completed += 1;
            if let Some(cb) = &progress {
                cb(completed, total, &name);
            }
        }

        names
            .iter()
            .filter(|n| self.cache.get(*n).is_some_and(|e| e.is_some()))
            .count()
    }

    fn tile_image(&self, name: &str) -> Option<Arc<RgbaImage>> {
        self.cache.get(name).and_then(|e| e.value().clone())
    }

    fn first_network_error(&self) -> Option<String> {
        self.first_error.lock().clone()
    }
}
