//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use automapper::config::ConfigFileError;
use automapper::hmap::FormatError;
use automapper::import::ImportError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to read the input file
    ReadInput { path: String, error: std::io::Error },
    /// The input is not a valid map export
    Decode(FormatError),
    /// The import failed
    Import(ImportError),
    /// Another import is running
    Rejected,
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Decode(FormatError::BadSignature) => {
                eprintln!();
                eprintln!("The file does not start with the map export signature.");
                eprintln!("Export the map again from the game client and retry.");
            }
            CliError::Rejected => {
                eprintln!();
                eprintln!("Wait for the running import to finish and retry.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ReadInput { path, error } => {
                write!(f, "Failed to read '{}': {}", path, error)
            }
            CliError::Decode(e) => write!(f, "Invalid map file: {}", e),
            CliError::Import(e) => write!(f, "Import failed: {}", e),
            CliError::Rejected => write!(f, "Another import is already in progress"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ReadInput { error, .. } => Some(error),
            CliError::Decode(e) => Some(e),
            CliError::Import(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<FormatError> for CliError {
    fn from(e: FormatError) -> Self {
        CliError::Decode(e)
    }
}

impl From<ImportError> for CliError {
    fn from(e: ImportError) -> Self {
        CliError::Import(e)
    }
}
