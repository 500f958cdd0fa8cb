//! Osprey Scanner - runs lookups and reports them as ordered events.
//!
//! A [`ScanWorker`] executes one lookup per invocation on a background task
//! and reports through a per-scan event channel. Consumers either read the
//! [`EventStream`] directly, dispatch it to [`EventHandler`]s, or hand the
//! [`ScanHandle`] to a [`ScanPipeline`], which enriches discovered accounts
//! and folds everything into a [`ScanSummary`] ready to persist.
//!
//! # Example
//!
//! ```rust,ignore
//! use osprey_scanner::{HttpProfileEnricher, LogHandler, ScanPipeline, ScanWorker};
//! use std::sync::Arc;
//!
//! let worker = ScanWorker::from_config(&config)?;
//! let pipeline = ScanPipeline::new(Arc::new(HttpProfileEnricher::from_config(&config)?));
//!
//! let handle = worker.run(ScanCategory::Username, TargetName::new("octocat")?);
//! let summary = pipeline.run(handle, &mut [&mut LogHandler]).await?;
//! for record in summary.records()? {
//!     store.save(&summary.target, &record.category, &record.payload).await?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod channel;
pub mod enrich;
#[allow(missing_docs)]
pub mod error;
pub mod event;
pub mod pipeline;
pub mod worker;

// Re-export commonly used types
pub use channel::{event_channel, EventHandler, EventSender, EventStream, LogHandler, NullHandler};
pub use enrich::{HttpProfileEnricher, NoopEnricher, ProfileEnricher, ProfileSource};
pub use error::{Result, ScanError};
pub use event::ScanEvent;
pub use pipeline::{ScanPipeline, ScanSummary};
pub use worker::{RetryPolicy, ScanHandle, ScanWorker};
