//! Osprey Collectors - lookup sources consumed by the scan worker.
//!
//! The [`collector`] module defines the interfaces the scanner depends on.
//! The remaining modules are HTTP-backed implementations of those interfaces:
//! an account-existence prober driven by TOML site definitions, RDAP domain and
//! network lookups, and a plain page fetcher used for profile enrichment.
//! Timeouts are enforced here, not by the scanner.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod accounts;
pub mod collector;
pub mod error;
pub mod http;
pub mod rdap;
pub mod sites;

// Re-export commonly used types
pub use accounts::HttpAccountProber;
pub use collector::{AccountEnumerator, AccountStatus, PageFetcher, RecordLookup, SiteCheck, SiteChecks};
pub use error::{CollectorError, Result};
pub use http::HttpPageFetcher;
pub use rdap::{RdapDomainLookup, RdapIpLookup};
pub use sites::{DetectionMethod, SiteDefinition, SiteLoader};
