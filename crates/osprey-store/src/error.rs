//! Error types for the identity store.

use osprey_core::{ConfigError, ValidationError};
use std::path::PathBuf;
use thiserror::Error;

/// A record could not be read or written.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem failure
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A target name or payload was rejected
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The storage location could not be resolved
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
