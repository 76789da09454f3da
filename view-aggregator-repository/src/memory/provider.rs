//! In-memory provider.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{json, Number, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use view_aggregator_shared::{path, Document, IndexQuery, SearchRequest, StatMetric, StatOp};

use crate::errors::SearchIndexError;
use crate::interfaces::DocumentIndexProvider;
use crate::memory::matcher::matches;
use crate::types::{SearchHit, StatValues};
use crate::utils;

type Index = BTreeMap<String, Document>;

/// Document index held in process memory.
///
/// Documents are kept per index in id order, so searches return hits in a
/// stable order. Writes are counted to let callers assert how many documents
/// a pipeline run touched.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use view_aggregator_repository::{DocumentIndexProvider, InMemoryIndexProvider};
///
/// # #[tokio::main]
/// # async fn main() {
/// let provider = InMemoryIndexProvider::new();
/// provider.seed("ns_store", vec![json!({"id": "s1", "name": "Main"})]).await;
/// assert!(provider.index_exists("ns_store").await.unwrap());
/// assert_eq!(provider.document("ns_store", "s1").await.unwrap()["name"], "Main");
/// # }
/// ```
#[derive(Default)]
pub struct InMemoryIndexProvider {
    indices: RwLock<BTreeMap<String, Index>>,
    writes: AtomicUsize,
}

impl InMemoryIndexProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert documents keyed by their `id` field, creating the index if needed.
    ///
    /// Values that are not objects or lack a string `id` are skipped. Seeding
    /// does not count as a write.
    pub async fn seed(&self, index: &str, documents: Vec<Value>) {
        let mut indices = self.indices.write().await;
        let target = indices.entry(index.to_string()).or_default();
        for document in documents {
            let Value::Object(document) = document else {
                warn!(index = %index, "Skipping non-object seed document");
                continue;
            };
            match document.get("id").and_then(Value::as_str) {
                Some(id) => {
                    target.insert(id.to_string(), document);
                }
                None => warn!(index = %index, "Skipping seed document without id"),
            }
        }
    }

    /// A copy of one stored document.
    pub async fn document(&self, index: &str, id: &str) -> Option<Document> {
        self.indices.read().await.get(index)?.get(id).cloned()
    }

    /// Copies of every document in an index, in id order.
    pub async fn documents(&self, index: &str) -> Vec<Document> {
        self.indices
            .read()
            .await
            .get(index)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids of every document in an index, in order.
    pub async fn ids(&self, index: &str) -> Vec<String> {
        self.indices
            .read()
            .await
            .get(index)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove a document without counting it as a pipeline write.
    pub async fn remove(&self, index: &str, id: &str) -> Option<Document> {
        self.indices.write().await.get_mut(index)?.remove(id)
    }

    /// Number of upserts and deletes performed through the provider trait.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn matching(&self, index: &str, query: &IndexQuery) -> Vec<(String, Document)> {
        let indices = self.indices.read().await;
        let Some(docs) = indices.get(index) else {
            debug!(index = %index, "Query against missing index");
            return Vec::new();
        };
        docs.iter()
            .filter(|(_, doc)| matches(doc, query))
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect()
    }

    fn to_hit(id: String, doc: Document, projection: Option<&[String]>) -> SearchHit {
        let source = match projection {
            Some(fields) => path::project(&doc, fields),
            None => doc,
        };
        SearchHit::new(id, source)
    }
}

fn number(value: f64) -> Value {
    Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn compute_metric(docs: &[(String, Document)], metric: &StatMetric) -> Value {
    let values: Vec<&Value> = docs
        .iter()
        .flat_map(|(_, doc)| path::collect(doc, &metric.field))
        .filter(|v| !v.is_null())
        .collect();
    let numeric: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();

    match metric.op {
        StatOp::Count => json!(values.len()),
        StatOp::Sum => number(numeric.iter().sum()),
        StatOp::Avg if numeric.is_empty() => Value::Null,
        StatOp::Avg => number(numeric.iter().sum::<f64>() / numeric.len() as f64),
        StatOp::Min => numeric
            .iter()
            .copied()
            .reduce(f64::min)
            .map(number)
            .unwrap_or(Value::Null),
        StatOp::Max => numeric
            .iter()
            .copied()
            .reduce(f64::max)
            .map(number)
            .unwrap_or(Value::Null),
    }
}

#[async_trait]
impl DocumentIndexProvider for InMemoryIndexProvider {
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        utils::validate_index_name(index)?;
        Ok(self.indices.read().await.contains_key(index))
    }

    async fn create_index(&self, index: &str) -> Result<(), SearchIndexError> {
        utils::validate_index_name(index)?;
        self.indices
            .write()
            .await
            .entry(index.to_string())
            .or_default();
        Ok(())
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<Vec<SearchHit>, SearchIndexError> {
        utils::validate_index_name(index)?;
        Ok(self
            .matching(index, &request.query)
            .await
            .into_iter()
            .take(request.size)
            .map(|(id, doc)| Self::to_hit(id, doc, request.projection.as_deref()))
            .collect())
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
        Ok(self
            .matching(index, query)
            .await
            .into_iter()
            .map(|(id, doc)| Self::to_hit(id, doc, projection))
            .collect())
    }

    async fn stats(
        &self,
        index: &str,
        query: &IndexQuery,
        metrics: &[StatMetric],
    ) -> Result<StatValues, SearchIndexError> {
        utils::validate_index_name(index)?;
        let docs = self.matching(index, query).await;
        let mut values = StatValues::new();
        for metric in metrics {
            values.insert(metric.name.clone(), compute_metric(&docs, metric));
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
        self.indices
            .write()
            .await
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), document.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &str) -> Result<(), SearchIndexError> {
        utils::validate_index_name(index)?;
        utils::validate_document_id(id)?;
        if let Some(docs) = self.indices.write().await.get_mut(index) {
            docs.remove(id);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
