//! Error types for the integrity engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type for integrity operations
pub type Result<T> = std::result::Result<T, IntegrityError>;

#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Walk error under {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Event log error: {0}")]
    EventLog(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntegrityError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IntegrityError::Io {
            path: path.into(),
            source,
        }
    }
}
