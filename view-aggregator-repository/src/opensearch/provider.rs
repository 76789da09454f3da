//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `DocumentIndexProvider`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    ClearScrollParts, DeleteParts, IndexParts, OpenSearch, ScrollParts, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;
use view_aggregator_shared::{Document, IndexQuery, SearchRequest, StatMetric, StatOp};

use crate::errors::SearchIndexError;
use crate::interfaces::DocumentIndexProvider;
use crate::opensearch::index_config::IndexConfig;
use crate::opensearch::query_dsl::{metric_aggregations, query_to_dsl};
use crate::types::{SearchHit, StatValues};
use crate::utils;

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// use view_aggregator_repository::opensearch::{IndexConfig, OpenSearchProvider};
/// use view_aggregator_shared::{IndexQuery, SearchRequest};
///
/// let provider = OpenSearchProvider::new("http://localhost:9200", IndexConfig::default()).await?;
/// let hits = provider
///     .search("salesai1_store", &SearchRequest::new(IndexQuery::term("id", "s1")))
///     .await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - Settings for created indices and scans
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            shards = index_config.number_of_shards,
            replicas = index_config.number_of_replicas,
            "Created OpenSearch provider"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Check that the cluster answers.
    ///
    /// Creating the provider does not contact the server, so callers that
    /// need a live connection should ping first.
    pub async fn ping(&self) -> Result<(), SearchIndexError> {
        let response = self
            .client
            .ping()
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(SearchIndexError::connection(format!(
                "Ping returned status {}",
                status
            )));
        }
        debug!("OpenSearch ping succeeded");
        Ok(())
    }

    /// Build the body of a search request.
    ///
    /// Bounded searches sort on `_id` so related documents come back in the
    /// same order on every run. Scroll scans use `_doc`, the cheapest order.
    fn search_body(
        query: &IndexQuery,
        projection: Option<&[String]>,
        size: usize,
        scroll: bool,
    ) -> Value {
        let sort = if scroll {
            json!(["_doc"])
        } else {
            json!([{ "_id": "asc" }])
        };
        let mut body = json!({
            "query": query_to_dsl(query),
            "size": size,
            "sort": sort,
        });
        if let Some(fields) = projection {
            body["_source"] = json!(fields);
        }
        body
    }

    /// Parse `hits.hits` from a search or scroll response body.
    fn parse_hits(body: &Value) -> Result<Vec<SearchHit>, SearchIndexError> {
        let hits = body["hits"]["hits"]
            .as_array()
            .ok_or_else(|| SearchIndexError::parse("Response has no hits.hits array"))?;

        hits.iter()
            .map(|hit| {
                let id = hit["_id"]
                    .as_str()
                    .ok_or_else(|| SearchIndexError::parse("Hit has no _id"))?;
                let source = match &hit["_source"] {
                    Value::Object(map) => map.clone(),
                    Value::Null => Document::new(),
                    _ => return Err(SearchIndexError::parse("Hit _source is not an object")),
                };
                Ok(SearchHit::new(id, source))
            })
            .collect()
    }

    /// Read the JSON body of a response, mapping non-success statuses to errors.
    ///
    /// Returns `Ok(None)` on 404 so callers can treat a missing index as empty.
    async fn read_body(
        response: Response,
        make_err: fn(String) -> SearchIndexError,
        what: &str,
    ) -> Result<Option<Value>, SearchIndexError> {
        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "{} request failed", what);
            return Err(make_err(format!(
                "{} failed with status {}: {}",
                what, status, error_body
            )));
        }
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        Ok(Some(body))
    }

    /// Release a scroll context. Failures are logged; the context expires anyway.
    async fn clear_scroll(&self, scroll_id: &str) {
        let result = self
            .client
            .clear_scroll(ClearScrollParts::None)
            .body(json!({ "scroll_id": [scroll_id] }))
            .send()
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Failed to clear scroll context");
        }
    }
}

#[async_trait]
impl DocumentIndexProvider for OpenSearchProvider {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        utils::validate_index_name(index)?;

        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            other => Err(SearchIndexError::unknown(format!(
                "Unexpected status {} checking index '{}'",
                other, index
            ))),
        }
    }

    async fn create_index(&self, index: &str) -> Result<(), SearchIndexError> {
        utils::validate_index_name(index)?;

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(self.index_config.view_index_settings())
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if status.is_success() {
            info!(index = %index, "Index created");
            return Ok(());
        }

        let error_body = response.text().await.unwrap_or_default();
        // Lost a race with another creator
        if error_body.contains("resource_already_exists_exception") {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }

        error!(status = %status, body = %error_body, "Create index request failed");
        Err(SearchIndexError::index_creation(format!(
            "Create index '{}' failed with status {}: {}",
            index, status, error_body
        )))
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>, SearchIndexError> {
        utils::validate_index_name(index)?;

        let body = Self::search_body(
            &request.query,
            request.projection.as_deref(),
            request.size,
            false,
        );
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::search(e.to_string()))?;

        match Self::read_body(response, SearchIndexError::SearchError, "Search").await? {
            Some(body) => Self::parse_hits(&body),
            None => {
                debug!(index = %index, "Search against missing index");
                Ok(Vec::new())
            }
        }
    }

    async fn scan(
        &self,
        index: &str,
        query: &IndexQuery,
        projection: Option<&[String]>,
        page_size: usize,
    ) -> Result<Vec<SearchHit>, SearchIndexError> {
        utils::validate_index_name(index)?;
        if page_size == 0 {
            return Err(SearchIndexError::validation("Scan page size must be positive"));
        }

        let keep_alive = self.index_config.scroll_keep_alive.as_str();
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .scroll(keep_alive)
            .body(Self::search_body(query, projection, page_size, true))
            .send()
            .await
            .map_err(|e| SearchIndexError::search(e.to_string()))?;

        let Some(mut body) = Self::read_body(response, SearchIndexError::SearchError, "Scan").await?
        else {
            return Ok(Vec::new());
        };

        let mut hits = Vec::new();
        loop {
            let page = Self::parse_hits(&body)?;
            let scroll_id = body["_scroll_id"].as_str().map(str::to_string);
            let exhausted = page.len() < page_size;
            hits.extend(page);

            let Some(scroll_id) = scroll_id else {
                break;
            };
            if exhausted {
                self.clear_scroll(&scroll_id).await;
                break;
            }

            let response = self
                .client
                .scroll(ScrollParts::None)
                .body(json!({ "scroll": keep_alive, "scroll_id": scroll_id }))
                .send()
                .await
                .map_err(|e| SearchIndexError::search(e.to_string()))?;

            match Self::read_body(response, SearchIndexError::SearchError, "Scroll").await? {
                Some(next) => body = next,
                None => {
                    return Err(SearchIndexError::search(format!(
                        "Scroll context for '{}' expired mid-scan",
                        index
                    )))
                }
            }
        }

        debug!(index = %index, count = hits.len(), "Scan complete");
        Ok(hits)
    }

    async fn stats(
        &self,
        index: &str,
        query: &IndexQuery,
        metrics: &[StatMetric],
    ) -> Result<StatValues, SearchIndexError> {
        utils::validate_index_name(index)?;

        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(json!({
                "size": 0,
                "query": query_to_dsl(query),
                "aggs": metric_aggregations(metrics),
            }))
            .send()
            .await
            .map_err(|e| SearchIndexError::aggregation(e.to_string()))?;

        let body = Self::read_body(response, SearchIndexError::AggregationError, "Aggregation")
            .await?;

        let mut values = StatValues::new();
        for metric in metrics {
            let value = match &body {
                Some(body) => body["aggregations"][metric.name.as_str()]["value"].clone(),
                // Same shape the backend returns for an empty index
                None => match metric.op {
                    StatOp::Count => json!(0),
                    StatOp::Sum => json!(0.0),
                    _ => Value::Null,
                },
            };
            values.insert(metric.name.clone(), value);
        }
        Ok(values)
    }

    async fn upsert_document(
        &self,
        index: &str,
        id: &str,
        document: &Document,
    ) -> Result<(), SearchIndexError> {
        utils::validate_index_name(index)?;
        utils::validate_document_id(id)?;

        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(document)
            .send()
            .await
            .map_err(|e| SearchIndexError::index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index request failed");
            return Err(SearchIndexError::index(format!(
                "Index of '{}' into '{}' failed with status {}: {}",
                id, index, status, error_body
            )));
        }

        debug!(index = %index, id = %id, "Document written");
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchIndexError> {
        utils::validate_index_name(index)?;
        utils::validate_document_id(id)?;

        let response = self
            .client
            .delete(DeleteParts::IndexId(index, id))
            .send()
            .await
            .map_err(|e| SearchIndexError::delete(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - document may not exist
        if !status.is_success() && status.as_u16() != 404 {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Delete request failed");
            return Err(SearchIndexError::delete(format!(
                "Delete failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index, id = %id, "Document deleted");
        Ok(())
    }
}
