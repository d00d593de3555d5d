/// Structured error types for taskhive-core.
///
/// Uses `thiserror` for better API surface and error composition.
/// The binary crate (taskhive-cli) can still use `anyhow` for convenience,
/// but library consumers get structured, composable errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for taskhive-core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// Config file could not be parsed
    #[error("Invalid config at {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Configuration value rejected
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Unknown task status value
    #[error("Unknown task status '{value}'")]
    UnknownStatus { value: String },

    /// Unknown group role value
    #[error("Unknown role '{value}'")]
    UnknownRole { value: String },
}

/// Result type alias for taskhive-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a configuration error with a reason
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}
