//! Utility functions for the view aggregator repository.

use crate::errors::SearchIndexError;

/// Validate a document id before it is used in a write or delete path.
///
/// # Example
///
/// ```
/// use view_aggregator_repository::utils::validate_document_id;
///
/// assert!(validate_document_id("s1").is_ok());
/// assert!(validate_document_id("").is_err());
/// ```
pub fn validate_document_id(id: &str) -> Result<(), SearchIndexError> {
    if id.trim().is_empty() {
        return Err(SearchIndexError::validation("Document id is required"));
    }
    if id.len() > 512 {
        return Err(SearchIndexError::validation(format!(
            "Document id is {} bytes long, maximum is 512",
            id.len()
        )));
    }
    Ok(())
}

/// Validate an index name against the backend's naming rules.
///
/// Index names must be lowercase, must not start with `-`, `_` or `+`, and
/// must not contain spaces or any of `\ / * ? " < > | , #`.
pub fn validate_index_name(index: &str) -> Result<(), SearchIndexError> {
    if index.is_empty() {
        return Err(SearchIndexError::validation("Index name is required"));
    }
    if index.starts_with(['-', '_', '+']) {
        return Err(SearchIndexError::validation(format!(
            "Index name '{}' must not start with '-', '_' or '+'",
            index
        )));
    }
    if index.chars().any(|c| c.is_uppercase()) {
        return Err(SearchIndexError::validation(format!(
            "Index name '{}' must be lowercase",
            index
        )));
    }
    if index
        .chars()
        .any(|c| c.is_whitespace() || "\\/*?\"<>|,#:".contains(c))
    {
        return Err(SearchIndexError::validation(format!(
            "Index name '{}' contains invalid characters",
            index
        )));
    }
    Ok(())
}
