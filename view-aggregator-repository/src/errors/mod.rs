//! Error types for the view aggregator repository.
//!
//! This module provides a unified error type for all document index operations.

mod search_index_error;

pub use search_index_error::SearchIndexError;
