//! Document index provider trait definition.
//!
//! This module defines the abstract interface for document index operations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;
use view_aggregator_shared::{Document, IndexQuery, SearchRequest, StatMetric};

use crate::errors::SearchIndexError;
use crate::types::{SearchHit, StatValues};

/// Abstracts the underlying document index (OpenSearch, Elasticsearch, in-memory).
///
/// Implementations are shared behind an `Arc` by every component of the
/// pipeline. All methods return `Result<T, SearchIndexError>` for consistent
/// error handling across backends.
///
/// # Missing indices
///
/// Reads (`search`, `scan`, `stats`) against an index that does not exist
/// return empty results rather than an error, and `delete_document` on a
/// missing document or index succeeds.
///
/// # Writes
///
/// `upsert_document` replaces the whole document stored under `id`. There is
/// no partial update: view documents are always rewritten in full.
#[async_trait]
pub trait DocumentIndexProvider: Send + Sync {
    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError>;

    /// Create an index with the provider's default settings.
    ///
    /// Creating an index that already exists is not an error.
    async fn create_index(&self, index: &str) -> Result<(), SearchIndexError>;

    /// Run a bounded search and return at most `request.size` hits, ordered
    /// by document id.
    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>, SearchIndexError>;

    /// Return every document matching `query`, paging through the index
    /// `page_size` documents at a time.
    async fn scan(
        &self,
        index: &str,
        query: &IndexQuery,
        projection: Option<&[String]>,
        page_size: usize,
    ) -> Result<Vec<SearchHit>, SearchIndexError>;

    /// Compute metric aggregations over the documents matching `query`.
    ///
    /// The result maps each metric's name to its value. Counts over no
    /// documents are `0`, sums `0.0`; averages, minimums and maximums are
    /// `null`.
    async fn stats(
        &self,
        index: &str,
        query: &IndexQuery,
        metrics: &[StatMetric],
    ) -> Result<StatValues, SearchIndexError>;

    /// Write `document` under `id`, replacing any previous version.
    async fn upsert_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), SearchIndexError>;

    /// Delete the document stored under `id`.
    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchIndexError>;
}
