//! Error types for CLI operations.

use contracts::LinkError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Settings file not found
    #[error("Settings file not found: {path}")]
    ConfigNotFound { path: String },

    /// Command-line argument outside its valid range
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Demo exceeded its wall-clock budget
    #[error("Demo did not finish within {seconds}s")]
    Timeout { seconds: u64 },

    /// Engine error
    #[error(transparent)]
    Engine(#[from] LinkError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
