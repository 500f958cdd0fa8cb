//! Osprey Correlate - links between the identifiers collected for a target.
//!
//! [`find_correlations`] reads a target's stored records and pulls out the
//! identifiers worth pivoting on. [`build_graph`] turns those into a star
//! graph centred on the target. Both are pure functions; malformed records
//! simply contribute nothing.
//!
//! # Example
//!
//! ```rust
//! use osprey_core::{ScanCategory, Target, TargetName};
//! use osprey_correlate::{build_graph, find_correlations};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut target = Target::new(TargetName::new("example.com")?);
//! target.insert(
//!     ScanCategory::Domain,
//!     json!({
//!         "emails": ["a@x.com", "b@x.com"],
//!         "registrar": "ACME",
//!         "name_servers": "ns1.x.com"
//!     }),
//! );
//!
//! let correlations = find_correlations(&target);
//! let graph = build_graph(&target, &correlations);
//!
//! assert_eq!(graph.node_count(), 5);
//! assert_eq!(graph.edge_count(), 4);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod correlation;
pub mod graph;

// Re-export commonly used types
pub use correlation::{find_correlations, CorrelationSet};
pub use graph::{build_graph, Graph, GraphEdge, GraphNode, NodeKind, UNKNOWN_REGISTRANT};
