//! Osprey Store - durable records for every scanned target.
//!
//! Records are keyed by target name and scan category. The
//! [`IdentityStore`] trait is the only interface the rest of Osprey uses;
//! [`FsIdentityStore`] persists to disk and [`MemoryIdentityStore`] keeps
//! everything in process.
//!
//! Loading never fails: a target whose records cannot be read is treated as
//! having no records. Saving reports every failure.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod fs;
pub mod memory;
pub mod store;

// Re-export commonly used types
pub use error::{Result, StoreError};
pub use fs::FsIdentityStore;
pub use memory::MemoryIdentityStore;
pub use store::IdentityStore;
