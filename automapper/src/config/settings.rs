//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use crate::import::CleanupPolicy;
use std::path::PathBuf;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub storage: StorageSettings,
    pub textures: TextureSettings,
    pub import: ImportSettings,
    pub pyramid: PyramidSettings,
    pub live: LiveSettings,
    pub logging: LoggingSettings,
}

/// Where tile files are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSettings {
    /// Root of the `tenants/<tenant>/<map>/<zoom>/` tree
    pub tile_root: PathBuf,
}

/// Texture lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSettings {
    /// Directory holding `<resource>.png` files
    pub directory: PathBuf,
}

/// Import pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    /// Largest segments kept from one file
    pub max_segments: usize,
    /// Concurrent render workers
    pub render_workers: usize,
    /// Rendered grids buffered between workers and the writer
    pub queue_capacity: usize,
    /// Grids per store flush
    pub batch_size: usize,
    /// Tasks spawned per dispatch batch
    pub max_in_flight: usize,
    /// Markers per upload call
    pub marker_batch_size: usize,
    pub cleanup: CleanupPolicy,
}

/// Zoom pyramid construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidSettings {
    /// Base coordinates composed together before flushing the cache
    pub chunk_size: usize,
}

/// Live window reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSettings {
    /// Create a map for windows with no known grid
    pub allow_new_maps: bool,
    /// Minutes before a stored grid image is requested again
    pub reupload_minutes: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
