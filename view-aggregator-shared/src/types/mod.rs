//! This module defines the core data structures and types used across the pipeline.
//! It re-exports the document alias, id selectors and query types.

pub mod clock;
pub mod document;
pub mod ids;
pub mod naming;
pub mod query;

pub use clock::{Clock, FixedClock, SystemClock};
pub use document::Document;
pub use ids::IdSelector;
pub use naming::IndexNaming;
pub use query::{IndexQuery, SearchRequest, StatMetric, StatOp};
