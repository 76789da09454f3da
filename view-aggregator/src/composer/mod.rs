//! View composer.
//!
//! Builds view documents from their source documents and writes them to the
//! view index. Each document goes through every aggregator before it is
//! written; a document whose aggregation fails is not written at all.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument};
use view_aggregator_repository::DocumentIndexProvider;
use view_aggregator_shared::{Clock, Document, IdSelector, IndexQuery};

use crate::aggregator;
use crate::definition::{Aggregator, ViewDefinition};
use crate::errors::AggregationError;
use crate::reader::SourceReader;

/// Field holding the time a view document was last written.
pub const AGGREGATED_AT_FIELD: &str = "_aggregatedAt";

/// Configuration for the composer.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Number of documents aggregated at the same time.
    pub id_concurrency: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self { id_concurrency: 1 }
    }
}

/// Outcome for one view document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeResult {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComposeResult {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(error.to_string()),
        }
    }
}

/// Outcome of writing a batch of view documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeSummary {
    pub view: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<ComposeResult>,
}

impl ComposeSummary {
    pub fn empty(view: impl Into<String>) -> Self {
        Self::from_results(view, Vec::new())
    }

    pub fn from_results(view: impl Into<String>, results: Vec<ComposeResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            view: view.into(),
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Ids of the documents that were not written.
    pub fn failed_ids(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.id.as_str())
            .collect()
    }
}

/// Composes view documents and writes them to view indices.
pub struct ViewComposer {
    reader: Arc<SourceReader>,
    provider: Arc<dyn DocumentIndexProvider>,
    clock: Arc<dyn Clock>,
    config: ComposerConfig,
}

impl ViewComposer {
    pub fn new(
        reader: Arc<SourceReader>,
        provider: Arc<dyn DocumentIndexProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_config(reader, provider, clock, ComposerConfig::default())
    }

    pub fn with_config(
        reader: Arc<SourceReader>,
        provider: Arc<dyn DocumentIndexProvider>,
        clock: Arc<dyn Clock>,
        config: ComposerConfig,
    ) -> Self {
        Self {
            reader,
            provider,
            clock,
            config,
        }
    }

    fn concurrency(&self) -> usize {
        self.config.id_concurrency.max(1)
    }

    /// Compose the view documents for the given source ids and write them.
    ///
    /// Ids without a source document are skipped. Failures are reported per
    /// document in the summary; only a failure to read the source documents
    /// fails the whole call.
    #[instrument(skip(self, view, ids), fields(view = %view.name()))]
    pub async fn compose(
        &self,
        view: &ViewDefinition,
        ids: impl Into<IdSelector>,
    ) -> Result<ComposeSummary, AggregationError> {
        if !view.is_materialized() {
            return Err(AggregationError::NotMaterialized(view.name().to_string()));
        }
        let ids = ids.into().into_vec();
        if ids.is_empty() {
            return Ok(ComposeSummary::empty(view.name()));
        }

        let naming = self.reader.naming();
        let source_index = naming.entity_index(view.source_entity());
        let view_index = naming.view_index(view.name());

        let documents = self
            .reader
            .fetch_by_ids(&source_index, ids.clone(), view.projection())
            .await?;
        if documents.len() < ids.len() {
            debug!(
                requested = ids.len(),
                found = documents.len(),
                "Some source documents do not exist"
            );
        }

        let stages = view.stages();
        let (view_index, stages) = (view_index.as_str(), stages.as_slice());
        let results: Vec<ComposeResult> = stream::iter(documents)
            .map(move |doc| self.write_document(view_index, stages, doc))
            .buffered(self.concurrency())
            .collect()
            .await;

        let summary = ComposeSummary::from_results(view.name(), results);
        info!(
            index = %view_index,
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Composed view documents"
        );
        Ok(summary)
    }

    /// Run `stages` over `doc`, stamp it and write it under its id.
    ///
    /// Shared with reverse-sync, which runs a subset of the stages over an
    /// existing view document.
    pub(crate) async fn write_document(
        &self,
        view_index: &str,
        stages: &[Vec<&Aggregator>],
        mut doc: Document,
    ) -> ComposeResult {
        let id = match doc.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                error!(index = %view_index, "Document has no usable id, skipping");
                return ComposeResult::failed("", AggregationError::malformed("document has no id"));
            }
        };

        if let Err(e) = aggregator::run_stages(stages, &self.reader, &mut doc).await {
            error!(index = %view_index, id = %id, error = %e, "Aggregation failed");
            return ComposeResult::failed(id, e);
        }

        doc.insert(
            AGGREGATED_AT_FIELD.to_string(),
            Value::String(self.clock.now().to_rfc3339()),
        );

        match self.provider.upsert_document(view_index, &id, &doc).await {
            Ok(()) => {
                debug!(index = %view_index, id = %id, "View document written");
                ComposeResult::ok(id)
            }
            Err(e) => {
                error!(index = %view_index, id = %id, error = %e, "Failed to write view document");
                ComposeResult::failed(id, e)
            }
        }
    }

    /// Compose view documents without writing them.
    ///
    /// Works for every view, and is the only way to read on-demand views.
    /// Documents come back in source index order, without a stamp.
    #[instrument(skip(self, view, ids), fields(view = %view.name()))]
    pub async fn preview(
        &self,
        view: &ViewDefinition,
        ids: impl Into<IdSelector>,
    ) -> Result<Vec<Document>, AggregationError> {
        let source_index = self.reader.naming().entity_index(view.source_entity());
        let documents = self
            .reader
            .fetch_by_ids(&source_index, ids, view.projection())
            .await?;
        self.aggregate_all(view, documents).await
    }

    /// Compose every view document whose source matches `filter`, without
    /// writing.
    #[instrument(skip(self, view, filter), fields(view = %view.name()))]
    pub async fn preview_all(
        &self,
        view: &ViewDefinition,
        filter: Option<IndexQuery>,
    ) -> Result<Vec<Document>, AggregationError> {
        let source_index = self.reader.naming().entity_index(view.source_entity());
        let query = filter.unwrap_or(IndexQuery::MatchAll);
        let documents = self
            .reader
            .scan(&source_index, &query, Some(view.projection()))
            .await?
            .into_iter()
            .map(|hit| hit.source)
            .collect();
        self.aggregate_all(view, documents).await
    }

    async fn aggregate_all(
        &self,
        view: &ViewDefinition,
        documents: Vec<Document>,
    ) -> Result<Vec<Document>, AggregationError> {
        let stages = view.stages();
        let stages = stages.as_slice();
        stream::iter(documents)
            .map(move |mut doc| {
                async move {
                    aggregator::run_stages(stages, &self.reader, &mut doc).await?;
                    Ok::<_, AggregationError>(doc)
                }
            })
            .buffered(self.concurrency())
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::test_support::{doc, reader};
    use crate::definition::{FieldBinding, LookupBinding};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use view_aggregator_repository::InMemoryIndexProvider;
    use view_aggregator_shared::FixedClock;

    const VIEW_INDEX: &str = "salesai1_auditlogview";

    fn view() -> ViewDefinition {
        ViewDefinition::builder("auditLogView", "auditLog")
            .project(&["id", "userId", "severity"])
            .field(FieldBinding::one("userInfo", "userId", "user").project(&["id", "email"]))
            .lookup(LookupBinding::new("severity", "auditLogSeverity"))
            .build()
            .unwrap()
    }

    async fn composer(concurrency: usize) -> (ViewComposer, Arc<InMemoryIndexProvider>) {
        let (reader, provider) = reader(vec![
            (
                "auditLog",
                vec![
                    json!({"id": "a1", "userId": "u1", "severity": "high", "ignored": 1}),
                    json!({"id": "a2", "userId": "u9", "severity": "low"}),
                    json!({"id": "a3", "severity": "high"}),
                ],
            ),
            ("user", vec![json!({"id": "u1", "email": "u1@example.com"})]),
            ("auditLogSeverity", vec![json!({"id": "high", "label": "High"})]),
        ])
        .await;
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let composer = ViewComposer::with_config(
            Arc::new(reader),
            provider.clone(),
            Arc::new(clock),
            ComposerConfig {
                id_concurrency: concurrency,
            },
        );
        (composer, provider)
    }

    #[tokio::test]
    async fn test_compose_writes_stamped_documents() {
        let (composer, provider) = composer(1).await;
        let summary = composer.compose(&view(), vec!["a1", "a2", "missing"]).await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);

        let a1 = provider.document(VIEW_INDEX, "a1").await.unwrap();
        assert_eq!(
            json!(a1),
            json!({
                "id": "a1",
                "userId": "u1",
                "severity": {"id": "high", "label": "High"},
                "userInfo": {"id": "u1", "email": "u1@example.com"},
                "_aggregatedAt": "2024-05-01T12:00:00+00:00"
            })
        );

        let a2 = provider.document(VIEW_INDEX, "a2").await.unwrap();
        assert!(!a2.contains_key("userInfo"));
        assert_eq!(a2["severity"], json!({"id": "low"}));
    }

    #[tokio::test]
    async fn test_compose_is_idempotent() {
        let (composer, provider) = composer(4).await;
        composer.compose(&view(), vec!["a1", "a2", "a3"]).await.unwrap();
        let first = serde_json::to_string(&provider.documents(VIEW_INDEX).await).unwrap();
        composer.compose(&view(), vec!["a1", "a2", "a3"]).await.unwrap();
        let second = serde_json::to_string(&provider.documents(VIEW_INDEX).await).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_compose_empty_ids() {
        let (composer, provider) = composer(1).await;
        let summary = composer.compose(&view(), Vec::<String>::new()).await.unwrap();
        assert_eq!(summary, ComposeSummary::empty("auditLogView"));
        assert_eq!(provider.writes(), 0);
    }

    #[tokio::test]
    async fn test_on_demand_views_are_not_written() {
        let (composer, _) = composer(1).await;
        let on_demand = ViewDefinition::builder("auditPreview", "auditLog")
            .project(&["id"])
            .on_demand()
            .build()
            .unwrap();
        assert!(matches!(
            composer.compose(&on_demand, "a1").await,
            Err(AggregationError::NotMaterialized(_))
        ));
    }

    #[tokio::test]
    async fn test_preview_does_not_write() {
        let (composer, provider) = composer(1).await;
        let docs = composer.preview(&view(), "a1").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["userInfo"]["email"], "u1@example.com");
        assert!(!docs[0].contains_key(AGGREGATED_AT_FIELD));

        let all = composer
            .preview_all(&view(), Some(IndexQuery::term("severity", "high")))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(provider.writes(), 0);
    }

    #[tokio::test]
    async fn test_document_without_id_fails_alone() {
        let (composer, _) = composer(1).await;
        let stages = view();
        let result = composer
            .write_document(VIEW_INDEX, &stages.stages(), doc(json!({"userId": "u1"})))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Malformed document: document has no id"));
    }
}
