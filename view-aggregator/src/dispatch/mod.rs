//! Change dispatcher.
//!
//! Turns "entity changed" and "entity removed" notifications into the view
//! updates they require: composing the views built from the entity and
//! resyncing the views that read it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument};
use view_aggregator_repository::DocumentIndexProvider;
use view_aggregator_shared::{IdSelector, IndexNaming};

use crate::composer::{ComposeResult, ComposeSummary, ViewComposer};
use crate::definition::ViewRegistry;
use crate::resync::ReverseSync;

/// What one notification changed in one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchTarget {
    pub view: String,
    /// The resynced aggregator, or `None` when the view's own documents
    /// were composed or deleted.
    pub target_key: Option<String>,
    pub summary: ComposeSummary,
}

/// Outcome of handling one notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchReport {
    pub entity: String,
    pub targets: Vec<DispatchTarget>,
    /// Errors that stopped a whole target. Per-document failures are in the
    /// target summaries.
    pub errors: Vec<String>,
}

impl DispatchReport {
    fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            ..Self::default()
        }
    }

    /// Number of view documents written or deleted.
    pub fn documents_written(&self) -> usize {
        self.targets.iter().map(|t| t.summary.succeeded).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty() || self.targets.iter().any(|t| t.summary.failed > 0)
    }
}

/// Fans entity notifications out to every affected view.
pub struct ChangeDispatcher {
    registry: Arc<ViewRegistry>,
    composer: Arc<ViewComposer>,
    resync: Arc<ReverseSync>,
    provider: Arc<dyn DocumentIndexProvider>,
    naming: IndexNaming,
}

impl ChangeDispatcher {
    pub fn new(
        registry: Arc<ViewRegistry>,
        composer: Arc<ViewComposer>,
        resync: Arc<ReverseSync>,
        provider: Arc<dyn DocumentIndexProvider>,
        naming: IndexNaming,
    ) -> Self {
        Self {
            registry,
            composer,
            resync,
            provider,
            naming,
        }
    }

    /// Handle created or updated documents of `entity`.
    ///
    /// Views built from the entity compose the documents again; views
    /// reading the entity resync the affected aggregator. Errors are logged
    /// and reported, never returned.
    #[instrument(skip(self, ids))]
    pub async fn entity_changed(&self, entity: &str, ids: impl Into<IdSelector>) -> DispatchReport {
        let ids = ids.into().into_vec();
        let mut report = DispatchReport::new(entity);
        if ids.is_empty() {
            return report;
        }

        for view in self.registry.sourced_from(entity) {
            match self.composer.compose(view, ids.clone()).await {
                Ok(summary) => report.targets.push(DispatchTarget {
                    view: view.name().to_string(),
                    target_key: None,
                    summary,
                }),
                Err(e) => {
                    error!(view = %view.name(), error = %e, "Failed to compose view");
                    report.errors.push(format!("{}: {}", view.name(), e));
                }
            }
        }

        self.resync_dependents(entity, &ids, &mut report).await;
        info!(
            targets = report.targets.len(),
            written = report.documents_written(),
            errors = report.errors.len(),
            "Entity change dispatched"
        );
        report
    }

    /// Handle deleted documents of `entity`.
    ///
    /// The view documents built from them are deleted, and views reading
    /// the entity drop it from the documents that referenced it.
    #[instrument(skip(self, ids))]
    pub async fn entity_removed(&self, entity: &str, ids: impl Into<IdSelector>) -> DispatchReport {
        let ids = ids.into().into_vec();
        let mut report = DispatchReport::new(entity);
        if ids.is_empty() {
            return report;
        }

        for view in self.registry.sourced_from(entity) {
            let index = self.naming.view_index(view.name());
            let mut results = Vec::with_capacity(ids.len());
            for id in &ids {
                match self.provider.delete_document(&index, id).await {
                    Ok(()) => results.push(ComposeResult::ok(id.clone())),
                    Err(e) => {
                        error!(index = %index, id = %id, error = %e, "Failed to delete view document");
                        results.push(ComposeResult::failed(id.clone(), e));
                    }
                }
            }
            report.targets.push(DispatchTarget {
                view: view.name().to_string(),
                target_key: None,
                summary: ComposeSummary::from_results(view.name(), results),
            });
        }

        self.resync_dependents(entity, &ids, &mut report).await;
        info!(
            targets = report.targets.len(),
            errors = report.errors.len(),
            "Entity removal dispatched"
        );
        report
    }

    async fn resync_dependents(&self, entity: &str, ids: &[String], report: &mut DispatchReport) {
        for dependent in self.registry.dependents(entity) {
            let view = &dependent.view;
            match self
                .resync
                .resync(view, &dependent.target_key, ids.to_vec())
                .await
            {
                Ok(summary) => report.targets.push(DispatchTarget {
                    view: view.name().to_string(),
                    target_key: Some(dependent.target_key.clone()),
                    summary,
                }),
                Err(e) => {
                    error!(
                        view = %view.name(),
                        target_key = %dependent.target_key,
                        error = %e,
                        "Failed to resync view"
                    );
                    report.errors.push(format!(
                        "{}.{}: {}",
                        view.name(),
                        dependent.target_key,
                        e
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::test_support::reader;
    use crate::definition::{FieldBinding, ViewDefinition};
    use chrono::Utc;
    use serde_json::json;
    use view_aggregator_repository::InMemoryIndexProvider;
    use view_aggregator_shared::{Clock, FixedClock};

    const VIEW_INDEX: &str = "salesai1_salesview";

    async fn dispatcher() -> (ChangeDispatcher, Arc<InMemoryIndexProvider>) {
        let (reader, provider) = reader(vec![
            (
                "saleTransaction",
                vec![
                    json!({"id": "t1", "storeId": "s1"}),
                    json!({"id": "t2", "storeId": "s2"}),
                ],
            ),
            (
                "store",
                vec![
                    json!({"id": "s1", "name": "Main"}),
                    json!({"id": "s2", "name": "Harbour"}),
                ],
            ),
        ])
        .await;

        let mut registry = ViewRegistry::new();
        registry
            .register(
                ViewDefinition::builder("salesView", "saleTransaction")
                    .project(&["id", "storeId"])
                    .field(FieldBinding::one("storeInfo", "storeId", "store").project(&["id", "name"]))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let reader = Arc::new(reader);
        let naming = reader.naming().clone();
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(Utc::now()));
        let composer = Arc::new(ViewComposer::new(reader.clone(), provider.clone(), clock));
        let resync = Arc::new(ReverseSync::new(reader, composer.clone(), 1));
        let dispatcher = ChangeDispatcher::new(
            Arc::new(registry),
            composer,
            resync,
            provider.clone(),
            naming,
        );
        (dispatcher, provider)
    }

    #[tokio::test]
    async fn test_source_change_composes_view() {
        let (dispatcher, provider) = dispatcher().await;
        let report = dispatcher.entity_changed("saleTransaction", "t1").await;
        assert_eq!(report.documents_written(), 1);
        assert!(!report.has_failures());
        assert_eq!(provider.ids(VIEW_INDEX).await, vec!["t1"]);
    }

    #[tokio::test]
    async fn test_related_change_resyncs_only_referencing_documents() {
        let (dispatcher, provider) = dispatcher().await;
        dispatcher
            .entity_changed("saleTransaction", vec!["t1", "t2"])
            .await;
        let t2_before = provider.document(VIEW_INDEX, "t2").await;

        provider
            .seed("salesai1_store", vec![json!({"id": "s1", "name": "Main Street"})])
            .await;
        let report = dispatcher.entity_changed("store", "s1").await;

        assert_eq!(report.targets.len(), 1);
        assert_eq!(report.targets[0].target_key.as_deref(), Some("storeInfo"));
        assert_eq!(report.documents_written(), 1);
        let t1 = provider.document(VIEW_INDEX, "t1").await.unwrap();
        assert_eq!(t1["storeInfo"]["name"], "Main Street");
        assert_eq!(provider.document(VIEW_INDEX, "t2").await, t2_before);
    }

    #[tokio::test]
    async fn test_removal_deletes_and_unsets() {
        let (dispatcher, provider) = dispatcher().await;
        dispatcher
            .entity_changed("saleTransaction", vec!["t1", "t2"])
            .await;

        provider.remove("salesai1_store", "s2").await;
        dispatcher.entity_removed("store", "s2").await;
        let t2 = provider.document(VIEW_INDEX, "t2").await.unwrap();
        assert!(!t2.contains_key("storeInfo"));

        provider.remove("salesai1_saletransaction", "t1").await;
        let report = dispatcher.entity_removed("saleTransaction", "t1").await;
        assert!(!report.has_failures());
        assert_eq!(provider.ids(VIEW_INDEX).await, vec!["t2"]);
    }

    #[tokio::test]
    async fn test_unrelated_entity_is_ignored() {
        let (dispatcher, provider) = dispatcher().await;
        let report = dispatcher.entity_changed("auditLog", "x").await;
        assert!(report.targets.is_empty());
        assert_eq!(provider.writes(), 0);
    }
}
