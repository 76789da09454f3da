//! Wiring of the pipeline components around one document index.

use std::sync::Arc;

use view_aggregator_repository::DocumentIndexProvider;
use view_aggregator_shared::{Clock, Document, IdSelector, IndexNaming, IndexQuery, SystemClock};

use crate::composer::{ComposeSummary, ComposerConfig, ViewComposer};
use crate::definition::{ViewDefinition, ViewRegistry};
use crate::dispatch::{ChangeDispatcher, DispatchReport};
use crate::errors::AggregationError;
use crate::reader::{ReaderConfig, SourceReader};
use crate::repair::{RepairOrchestrator, RepairReport, ViewRepairSummary};
use crate::resync::ReverseSync;

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    provider: Arc<dyn DocumentIndexProvider>,
    naming: IndexNaming,
    registry: ViewRegistry,
    clock: Arc<dyn Clock>,
    reader_config: ReaderConfig,
    composer_config: ComposerConfig,
}

impl PipelineBuilder {
    /// Clock used for `_aggregatedAt` and repair reports.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn reader_config(mut self, config: ReaderConfig) -> Self {
        self.reader_config = config;
        self
    }

    pub fn composer_config(mut self, config: ComposerConfig) -> Self {
        self.composer_config = config;
        self
    }

    pub fn build(self) -> Pipeline {
        let registry = Arc::new(self.registry);
        let reader = Arc::new(SourceReader::with_config(
            self.provider.clone(),
            self.naming.clone(),
            self.reader_config,
        ));
        let concurrency = self.composer_config.id_concurrency;
        let composer = Arc::new(ViewComposer::with_config(
            reader.clone(),
            self.provider.clone(),
            self.clock.clone(),
            self.composer_config,
        ));
        let resync = Arc::new(ReverseSync::new(reader.clone(), composer.clone(), concurrency));
        let repair = RepairOrchestrator::new(
            registry.clone(),
            reader,
            self.provider.clone(),
            composer.clone(),
            self.clock,
        );
        let dispatcher = ChangeDispatcher::new(
            registry.clone(),
            composer.clone(),
            resync.clone(),
            self.provider,
            self.naming,
        );

        Pipeline {
            registry,
            composer,
            resync,
            repair,
            dispatcher,
        }
    }
}

/// Every pipeline operation, addressed by view name.
pub struct Pipeline {
    registry: Arc<ViewRegistry>,
    composer: Arc<ViewComposer>,
    resync: Arc<ReverseSync>,
    repair: RepairOrchestrator,
    dispatcher: ChangeDispatcher,
}

impl Pipeline {
    pub fn builder(
        provider: Arc<dyn DocumentIndexProvider>,
        naming: IndexNaming,
        registry: ViewRegistry,
    ) -> PipelineBuilder {
        PipelineBuilder {
            provider,
            naming,
            registry,
            clock: Arc::new(SystemClock),
            reader_config: ReaderConfig::default(),
            composer_config: ComposerConfig::default(),
        }
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn view(&self, name: &str) -> Result<Arc<ViewDefinition>, AggregationError> {
        self.registry.get(name)
    }

    /// Compose and write the documents of `view` for the source ids.
    pub async fn compose_view(
        &self,
        view: &str,
        ids: impl Into<IdSelector>,
    ) -> Result<ComposeSummary, AggregationError> {
        let view = self.view(view)?;
        self.composer.compose(&view, ids).await
    }

    /// Refresh the documents of `view` that reference the changed related
    /// documents through `target_key`.
    pub async fn resync_relation(
        &self,
        view: &str,
        target_key: &str,
        changed_ids: impl Into<IdSelector>,
    ) -> Result<ComposeSummary, AggregationError> {
        let view = self.view(view)?;
        self.resync.resync(&view, target_key, changed_ids).await
    }

    /// Compose documents of `view` without writing them.
    pub async fn preview(
        &self,
        view: &str,
        ids: impl Into<IdSelector>,
    ) -> Result<Vec<Document>, AggregationError> {
        let view = self.view(view)?;
        self.composer.preview(&view, ids).await
    }

    /// Compose every document of `view` matching `filter` without writing.
    pub async fn preview_all(
        &self,
        view: &str,
        filter: Option<IndexQuery>,
    ) -> Result<Vec<Document>, AggregationError> {
        let view = self.view(view)?;
        self.composer.preview_all(&view, filter).await
    }

    pub async fn repair_view(&self, view: &str) -> Result<ViewRepairSummary, AggregationError> {
        self.repair.repair_view(view).await
    }

    pub async fn run_all_repair(&self) -> RepairReport {
        self.repair.run_all_repair().await
    }

    pub async fn entity_changed(&self, entity: &str, ids: impl Into<IdSelector>) -> DispatchReport {
        self.dispatcher.entity_changed(entity, ids).await
    }

    pub async fn entity_removed(&self, entity: &str, ids: impl Into<IdSelector>) -> DispatchReport {
        self.dispatcher.entity_removed(entity, ids).await
    }
}
