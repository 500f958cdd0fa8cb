//! Core error types for Osprey.
//!
//! `OspreyError` is the umbrella type used by the application shell. Library
//! crates define their own error enums (`CollectorError`, `StoreError`) and
//! share [`ValidationError`] for data-model violations.

use thiserror::Error;

/// Anything the shell can hit outside a single subsystem.
#[derive(Error, Debug)]
pub enum OspreyError {
    /// Config could not be loaded or is invalid
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// A record or target name was rejected
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Filesystem
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant broken inside Osprey itself
    #[error("internal error: {0}")]
    Internal(String),
}

/// A value violated one of the data-model invariants.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Target names are used as storage keys and cannot be blank
    #[error("target name must not be empty")]
    EmptyTargetName,

    /// Target name contains characters that are not allowed
    #[error("invalid target name {name:?}: {reason}")]
    InvalidTargetName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Scan category label was blank
    #[error("scan category must not be empty")]
    EmptyCategory,

    /// Payload cannot be represented as a JSON document
    #[error("payload is not JSON-serializable: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Loading, saving or validating `config.toml` failed.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No home directory to derive the XDG paths from
    #[error("no config directory available on this system")]
    NoConfigDir,

    /// Malformed TOML
    #[error("config.toml is not valid: {0}")]
    Parse(#[from] toml::de::Error),

    /// Encoding for `save_to`
    #[error("could not encode config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Reading or writing the config file
    #[error("config file: {0}")]
    Io(#[from] std::io::Error),

    /// A field holds a value Osprey cannot run with
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted path of the field, e.g. `scanning.max_retries`
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Shorthand for results carrying an [`OspreyError`].
pub type Result<T> = std::result::Result<T, OspreyError>;

/// Shorthand for results carrying a [`ConfigError`].
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
