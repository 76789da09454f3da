//! OpenSearch implementation of the document index provider.
//!
//! This module provides a concrete implementation of `DocumentIndexProvider`
//! using OpenSearch (or a wire-compatible Elasticsearch) as the backend.

mod index_config;
mod provider;
mod query_dsl;

pub use index_config::IndexConfig;
pub use provider::OpenSearchProvider;
pub use query_dsl::{metric_aggregations, query_to_dsl};
