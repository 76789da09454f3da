//! Error types for the aggregation pipeline.

use thiserror::Error;
use view_aggregator_repository::SearchIndexError;

/// Errors that can occur while composing, resyncing or repairing views.
#[derive(Error, Debug)]
pub enum AggregationError {
    /// Failure reported by the document index.
    #[error("Index error: {0}")]
    Index(#[from] SearchIndexError),

    /// A view definition broke one of the build-time rules.
    #[error("Invalid definition for view '{view}': {reason}")]
    InvalidDefinition { view: String, reason: String },

    /// No view is registered under the name.
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// The view has no aggregator writing to the key.
    #[error("View '{view}' has no aggregator for '{key}'")]
    UnknownRelation { view: String, key: String },

    /// The view is composed at read time and has no index.
    #[error("View '{0}' is composed on demand and is never written")]
    NotMaterialized(String),

    /// A document could not be processed as-is.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),
}

impl AggregationError {
    /// Create an invalid definition error.
    pub fn invalid(view: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            view: view.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed document error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_errors_convert() {
        let err: AggregationError = SearchIndexError::search("timeout").into();
        assert!(matches!(err, AggregationError::Index(_)));
        assert_eq!(err.to_string(), "Index error: Search error: timeout");
    }

    #[test]
    fn test_invalid_definition_message() {
        let err = AggregationError::invalid("salesDashboardView", "duplicate target key 'storeInfo'");
        assert_eq!(
            err.to_string(),
            "Invalid definition for view 'salesDashboardView': duplicate target key 'storeInfo'"
        );
    }
}
