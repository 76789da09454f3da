//! Response types for document index operations.

use serde::{Deserialize, Serialize};
use view_aggregator_shared::Document;

/// One document returned by a search or scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The backend document id (`_id`).
    pub id: String,
    /// The (possibly projected) document body.
    pub source: Document,
}

impl SearchHit {
    pub fn new(id: impl Into<String>, source: Document) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    /// The document's own `id` field, falling back to the backend id.
    ///
    /// Source indices are written by other services and the two usually
    /// agree; the `id` field is what the pipeline keys view documents by.
    pub fn entity_id(&self) -> &str {
        self.source
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.id)
    }
}

/// Metric name to value, as returned by `DocumentIndexProvider::stats`.
pub type StatValues = Document;
