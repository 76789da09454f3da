//! Search index error types.
//!
//! This module defines the unified error type for all document index operations,
//! covering both transport-level failures and malformed backend responses.

use thiserror::Error;

/// Unified errors from document index operations.
///
/// Used by the `DocumentIndexProvider` trait and everything built on it. A
/// query that matches nothing is not an error; neither is reading from an
/// index that does not exist yet.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., empty document id, invalid index name).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to establish connection to the search index backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A search or scroll request failed.
    #[error("Search error: {0}")]
    SearchError(String),

    /// An aggregation request failed.
    #[error("Aggregation error: {0}")]
    AggregationError(String),

    /// Failed to write a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to create an index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// Failed to parse response from search index backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search index backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a search error.
    pub fn search(msg: impl Into<String>) -> Self {
        Self::SearchError(msg.into())
    }

    /// Create an aggregation error.
    pub fn aggregation(msg: impl Into<String>) -> Self {
        Self::AggregationError(msg.into())
    }

    /// Create an index (write) error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether the error came from reading (search, scroll, aggregation)
    /// rather than writing.
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self,
            Self::SearchError(_) | Self::AggregationError(_) | Self::ParseError(_)
        )
    }
}
