//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, the conversions into runtime option
//! types and the `ConfigFile::default()` implementation.

use super::file::config_directory;
use super::settings::*;
use crate::import::{
    CleanupPolicy, ImportOptions, DEFAULT_IMPORT_BATCH_SIZE, DEFAULT_MARKER_BATCH_SIZE,
    DEFAULT_MAX_SEGMENTS,
};
use crate::live::LiveConfig;
use crate::pipeline::{PoolConfig, DEFAULT_MAX_IN_FLIGHT, DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS};
use crate::pyramid::{PyramidConfig, DEFAULT_BATCH_SIZE, DEFAULT_CHUNK_SIZE};
use chrono::TimeDelta;

/// Default minutes between image requests for a live grid.
pub const DEFAULT_REUPLOAD_MINUTES: u64 = 30;

/// Upper bound for `reupload_minutes` (one year).
pub const MAX_REUPLOAD_MINUTES: u64 = 525_600;

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE: &str = "automapper.log";

impl Default for ConfigFile {
    fn default() -> Self {
        let base = config_directory();
        Self {
            storage: StorageSettings {
                tile_root: base.join("tiles"),
            },
            textures: TextureSettings {
                directory: base.join("textures"),
            },
            import: ImportSettings {
                max_segments: DEFAULT_MAX_SEGMENTS,
                render_workers: DEFAULT_WORKERS,
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
                batch_size: DEFAULT_IMPORT_BATCH_SIZE,
                max_in_flight: DEFAULT_MAX_IN_FLIGHT,
                marker_batch_size: DEFAULT_MARKER_BATCH_SIZE,
                cleanup: CleanupPolicy::default(),
            },
            pyramid: PyramidSettings {
                chunk_size: DEFAULT_CHUNK_SIZE,
            },
            live: LiveSettings {
                allow_new_maps: true,
                reupload_minutes: DEFAULT_REUPLOAD_MINUTES,
            },
            logging: LoggingSettings {
                file: base.join(DEFAULT_LOG_FILE),
            },
        }
    }
}

impl ConfigFile {
    /// Worker pool bounds shared by rendering and composition.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.import.render_workers,
            max_in_flight: self.import.max_in_flight,
            queue_capacity: self.import.queue_capacity,
        }
    }

    pub fn pyramid_config(&self) -> PyramidConfig {
        PyramidConfig {
            chunk_size: self.pyramid.chunk_size,
            batch_size: DEFAULT_BATCH_SIZE,
            pool: self.pool_config(),
        }
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            max_segments: self.import.max_segments,
            batch_size: self.import.batch_size,
            marker_batch_size: self.import.marker_batch_size,
            pool: self.pool_config(),
            pyramid: self.pyramid_config(),
            cleanup: self.import.cleanup,
        }
    }

    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            allow_new_maps: self.live.allow_new_maps,
            reupload_after: TimeDelta::minutes(
                self.live.reupload_minutes.min(MAX_REUPLOAD_MINUTES) as i64,
            ),
            pyramid: self.pyramid_config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.import.max_segments, 3);
        assert_eq!(config.import.render_workers, 4);
        assert_eq!(config.import.queue_capacity, 50);
        assert_eq!(config.import.batch_size, 500);
        assert_eq!(config.import.max_in_flight, 100);
        assert_eq!(config.import.cleanup, CleanupPolicy::OnFailure);
        assert_eq!(config.pyramid.chunk_size, 10_000);
        assert!(config.live.allow_new_maps);
        assert!(config.storage.tile_root.ends_with("tiles"));
    }

    #[test]
    fn test_options_follow_settings() {
        let mut config = ConfigFile::default();
        config.import.render_workers = 2;
        config.pyramid.chunk_size = 64;
        config.live.reupload_minutes = 5;

        let options = config.import_options();
        assert_eq!(options.pool.workers, 2);
        assert_eq!(options.pyramid.chunk_size, 64);
        assert_eq!(options.pyramid.pool.workers, 2);
        assert_eq!(config.live_config().reupload_after, TimeDelta::minutes(5));
    }
}
