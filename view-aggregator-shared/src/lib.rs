//! # View Aggregator Shared
//!
//! This crate defines shared data structures and types used across the view
//! aggregation pipeline. It includes the document model, id selectors, index
//! naming, the typed query model and the clock used to stamp view documents.

pub mod types;

pub use types::clock::{Clock, FixedClock, SystemClock};
pub use types::document::{path, Document};
pub use types::ids::IdSelector;
pub use types::naming::{IndexNaming, NamingError};
pub use types::query::{IndexQuery, SearchRequest, StatMetric, StatOp};
