//! Source index reader.
//!
//! Read access to entity and view indices, on top of a
//! [`DocumentIndexProvider`]. Every method takes a resolved index name; use
//! [`SourceReader::naming`] to resolve entity and view names.

use std::sync::Arc;

use tracing::{debug, warn};
use view_aggregator_repository::{DocumentIndexProvider, SearchHit, StatValues};
use view_aggregator_shared::{
    Document, IdSelector, IndexNaming, IndexQuery, SearchRequest, StatMetric,
};

use crate::errors::AggregationError;

/// Configuration for the reader.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Page size used when walking a whole index.
    pub scan_page_size: usize,
    /// Maximum number of related documents attached by one to-many relation.
    pub relation_fetch_limit: usize,
    /// Maximum number of ids sent in a single terms query.
    pub max_terms: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            scan_page_size: 500,
            relation_fetch_limit: 1000,
            max_terms: 1024,
        }
    }
}

/// Reads documents from source, reference and view indices.
pub struct SourceReader {
    provider: Arc<dyn DocumentIndexProvider>,
    naming: IndexNaming,
    config: ReaderConfig,
}

impl SourceReader {
    pub fn new(provider: Arc<dyn DocumentIndexProvider>, naming: IndexNaming) -> Self {
        Self::with_config(provider, naming, ReaderConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn DocumentIndexProvider>,
        naming: IndexNaming,
        config: ReaderConfig,
    ) -> Self {
        Self {
            provider,
            naming,
            config,
        }
    }

    pub fn naming(&self) -> &IndexNaming {
        &self.naming
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Fetch documents by `id`, projected to `projection`.
    ///
    /// Accepts one id or many. Ids with no document are skipped, so the
    /// result may be shorter than the input. Large id lists are split into
    /// several queries.
    pub async fn fetch_by_ids(
        &self,
        index: &str,
        ids: impl Into<IdSelector>,
        projection: &[String],
    ) -> Result<Vec<Document>, AggregationError> {
        let ids = ids.into().into_vec();
        let mut documents = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(self.config.max_terms.max(1)) {
            let mut request = SearchRequest::new(IndexQuery::ids(chunk)).size(chunk.len());
            if !projection.is_empty() {
                request = request.project(projection);
            }
            let hits = self.provider.search(index, &request).await?;
            documents.extend(hits.into_iter().map(|hit| hit.source));
        }

        debug!(
            index = %index,
            requested = ids.len(),
            found = documents.len(),
            "Fetched documents by id"
        );
        Ok(documents)
    }

    /// The first document matching `query`, if any.
    pub async fn find_first(
        &self,
        index: &str,
        query: IndexQuery,
        projection: &[String],
    ) -> Result<Option<Document>, AggregationError> {
        Ok(self
            .find(index, query, projection, 1)
            .await?
            .into_iter()
            .next())
    }

    /// Up to `limit` documents matching `query`.
    pub async fn find(
        &self,
        index: &str,
        query: IndexQuery,
        projection: &[String],
        limit: usize,
    ) -> Result<Vec<Document>, AggregationError> {
        let mut request = SearchRequest::new(query).size(limit);
        if !projection.is_empty() {
            request = request.project(projection);
        }
        let hits = self.provider.search(index, &request).await?;
        Ok(hits.into_iter().map(|hit| hit.source).collect())
    }

    /// Documents matching `query`, capped at the relation fetch limit.
    pub async fn find_related(
        &self,
        index: &str,
        query: IndexQuery,
        projection: &[String],
    ) -> Result<Vec<Document>, AggregationError> {
        let limit = self.config.relation_fetch_limit;
        let documents = self.find(index, query, projection, limit).await?;
        if documents.len() >= limit {
            warn!(
                index = %index,
                limit = limit,
                "Relation reached the fetch limit, remaining documents are not attached"
            );
        }
        Ok(documents)
    }

    /// Every document matching `query`, paging through the index.
    pub async fn scan(
        &self,
        index: &str,
        query: &IndexQuery,
        projection: Option<&[String]>,
    ) -> Result<Vec<SearchHit>, AggregationError> {
        Ok(self
            .provider
            .scan(index, query, projection, self.config.scan_page_size)
            .await?)
    }

    /// The id of every document in `index`.
    pub async fn scan_ids(&self, index: &str) -> Result<Vec<String>, AggregationError> {
        let projection = ["id".to_string()];
        let hits = self
            .scan(index, &IndexQuery::MatchAll, Some(&projection))
            .await?;
        Ok(hits
            .iter()
            .map(|hit| hit.entity_id().to_string())
            .collect())
    }

    /// Metric aggregations over the documents matching `query`.
    pub async fn stats(
        &self,
        index: &str,
        query: &IndexQuery,
        metrics: &[StatMetric],
    ) -> Result<StatValues, AggregationError> {
        Ok(self.provider.stats(index, query, metrics).await?)
    }
}
