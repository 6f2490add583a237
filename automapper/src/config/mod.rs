//! Configuration file support.
//!
//! Settings are read from an INI file (`~/.automapper/config.ini` by
//! default); a missing file yields the defaults. [`ConfigFile`] converts
//! into the runtime option types of the engine.
//!
//! # Example
//!
//! ```
//! use automapper::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let options = config.import_options();
//! assert_eq!(options.max_segments, 3);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{DEFAULT_LOG_FILE, DEFAULT_REUPLOAD_MINUTES, MAX_REUPLOAD_MINUTES};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    ConfigFile, ImportSettings, LiveSettings, LoggingSettings, PyramidSettings, StorageSettings,
    TextureSettings,
};
