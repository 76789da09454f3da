//! Repair orchestrator.
//!
//! Rebuilds view indices from scratch: every source document is composed
//! again and view documents whose source is gone are deleted.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use view_aggregator_repository::DocumentIndexProvider;
use view_aggregator_shared::Clock;

use crate::composer::ViewComposer;
use crate::definition::ViewRegistry;
use crate::errors::AggregationError;
use crate::reader::SourceReader;

/// Outcome of repairing one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewRepairSummary {
    pub view: String,
    pub index: String,
    /// Whether the view index had to be created.
    pub index_created: bool,
    pub source_documents: usize,
    pub composed: usize,
    pub failed: usize,
    /// View documents deleted because their source no longer exists.
    pub removed: usize,
}

/// Outcome of one view in a full repair run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RepairOutcome {
    Completed(ViewRepairSummary),
    Failed { view: String, error: String },
}

impl RepairOutcome {
    pub fn view(&self) -> &str {
        match self {
            Self::Completed(summary) => &summary.view,
            Self::Failed { view, .. } => view,
        }
    }

    /// True when the view was rebuilt and every document was written.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Completed(summary) if summary.failed == 0)
    }
}

/// Outcome of a full repair run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<RepairOutcome>,
}

impl RepairReport {
    /// Views that failed outright or left documents unwritten.
    pub fn unclean_views(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_clean())
            .map(RepairOutcome::view)
            .collect()
    }
}

/// Runs full rebuilds of materialized views.
pub struct RepairOrchestrator {
    registry: Arc<ViewRegistry>,
    reader: Arc<SourceReader>,
    provider: Arc<dyn DocumentIndexProvider>,
    composer: Arc<ViewComposer>,
    clock: Arc<dyn Clock>,
}

impl RepairOrchestrator {
    pub fn new(
        registry: Arc<ViewRegistry>,
        reader: Arc<SourceReader>,
        provider: Arc<dyn DocumentIndexProvider>,
        composer: Arc<ViewComposer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            reader,
            provider,
            composer,
            clock,
        }
    }

    /// Repair every materialized view, one after the other.
    ///
    /// A view that fails is logged and reported; the remaining views are
    /// still repaired.
    #[instrument(skip(self))]
    pub async fn run_all_repair(&self) -> RepairReport {
        let started_at = self.clock.now();
        info!(views = self.registry.materialized().count(), "Starting repair of all views");

        let mut outcomes = Vec::new();
        for view in self.registry.materialized() {
            let outcome = match self.repair_view(view.name()).await {
                Ok(summary) => RepairOutcome::Completed(summary),
                Err(e) => {
                    error!(view = %view.name(), error = %e, "View repair failed");
                    RepairOutcome::Failed {
                        view: view.name().to_string(),
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = RepairReport {
            started_at,
            finished_at: self.clock.now(),
            outcomes,
        };
        let unclean = report.unclean_views();
        if unclean.is_empty() {
            info!("Repair of all views completed");
        } else {
            warn!(views = ?unclean, "Repair completed with failures");
        }
        report
    }

    /// Rebuild one view.
    ///
    /// Creates the view index when missing, composes every source document
    /// and deletes view documents with no source document.
    #[instrument(skip(self))]
    pub async fn repair_view(&self, name: &str) -> Result<ViewRepairSummary, AggregationError> {
        let view = self.registry.get(name)?;
        if !view.is_materialized() {
            return Err(AggregationError::NotMaterialized(view.name().to_string()));
        }

        let naming = self.reader.naming();
        let source_index = naming.entity_index(view.source_entity());
        let view_index = naming.view_index(view.name());

        let index_created = self.ensure_index(&view_index).await?;
        let source_ids = self.reader.scan_ids(&source_index).await?;
        info!(
            source_index = %source_index,
            index = %view_index,
            source_documents = source_ids.len(),
            "Repairing view"
        );

        let summary = self.composer.compose(&view, source_ids.clone()).await?;

        let keep: HashSet<&str> = source_ids.iter().map(String::as_str).collect();
        let mut removed = 0;
        for id in self.reader.scan_ids(&view_index).await? {
            if keep.contains(id.as_str()) {
                continue;
            }
            self.provider.delete_document(&view_index, &id).await?;
            removed += 1;
        }

        info!(
            index = %view_index,
            composed = summary.succeeded,
            failed = summary.failed,
            removed = removed,
            "View repaired"
        );
        Ok(ViewRepairSummary {
            view: view.name().to_string(),
            index: view_index,
            index_created,
            source_documents: source_ids.len(),
            composed: summary.succeeded,
            failed: summary.failed,
            removed,
        })
    }

    /// Create `index` unless it exists. Returns whether it was created.
    async fn ensure_index(&self, index: &str) -> Result<bool, AggregationError> {
        if self.provider.index_exists(index).await? {
            return Ok(false);
        }
        info!(index = %index, "Creating view index");
        self.provider.create_index(index).await?;
        Ok(true)
    }
}
