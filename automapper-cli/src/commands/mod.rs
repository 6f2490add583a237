//! CLI command implementations.
//!
//! - [`config`] - Configuration management (init, path, show)
//! - [`import`] - Import a map export into the tile store
//! - [`inspect`] - Decode a map export and print what it contains

pub mod config;
pub mod import;
pub mod inspect;

use crate::error::CliError;
use std::path::Path;

/// Reads an input file, mapping failures to a CLI error.
pub fn read_input(path: &Path) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|error| CliError::ReadInput {
        path: path.display().to_string(),
        error,
    })
}
