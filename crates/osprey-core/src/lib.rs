//! Osprey Core - Foundation crate for the Osprey identity correlation toolkit.
//!
//! This crate provides the shared data model, error handling and configuration
//! management that every other Osprey crate depends on. It performs no network
//! or storage I/O beyond reading and writing its own config file.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Targets, scan categories, records and profile records
//!
//! # Example
//!
//! ```rust
//! use osprey_core::{ScanCategory, Target, TargetName};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let name = TargetName::new("example.com")?;
//! let mut target = Target::new(name);
//! target.insert(ScanCategory::Domain, serde_json::json!({ "registrar": "ACME" }));
//!
//! assert_eq!(ScanCategory::IpAddress.storage_key(), "ip_address");
//! assert!(target.record(&ScanCategory::Domain).is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, EnrichmentConfig, RdapConfig, ScanningConfig, StorageConfig};
pub use error::{ConfigError, ConfigResult, OspreyError, Result, ValidationError};
pub use types::{
    title_case, to_payload, ProfileRecord, ScanCategory, ScanRecord, Target, TargetName, Timestamp,
};
