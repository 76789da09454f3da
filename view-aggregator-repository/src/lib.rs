//! # View Aggregator Repository
//!
//! This crate provides the trait and implementations for reading from and
//! writing to the document index. It includes definitions for errors, the
//! provider interface, a concrete implementation for OpenSearch and an
//! in-memory implementation.

pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod types;
pub mod utils;

pub use errors::SearchIndexError;
pub use interfaces::DocumentIndexProvider;
pub use memory::InMemoryIndexProvider;
pub use opensearch::OpenSearchProvider;
pub use types::{SearchHit, StatValues};
