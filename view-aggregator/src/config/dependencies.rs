//! Dependency initialization and wiring for the view aggregator.

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use super::settings::Settings;
use crate::catalog;
use crate::pipeline::Pipeline;
use crate::PipelineError;
use view_aggregator_repository::opensearch::IndexConfig;
use view_aggregator_repository::OpenSearchProvider;

/// What to do when OpenSearch cannot be reached at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Give up on the first failed ping.
    FailFast,
    /// Retry the connection at a fixed interval until it succeeds.
    Retry,
}

impl ConnectionMode {
    /// Read `OPENSEARCH_CONNECTION_MODE`: `fail-fast` or `retry`, any case.
    /// Anything else falls back to `retry`.
    pub(crate) fn from_env() -> Self {
        match env::var("OPENSEARCH_CONNECTION_MODE")
            .unwrap_or_else(|_| "retry".to_string())
            .to_lowercase()
            .as_str()
        {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Settings and the pipeline built from them.
pub struct Dependencies {
    pub settings: Settings,
    /// The pipeline wired to OpenSearch with the platform's views.
    pub pipeline: Pipeline,
}

impl Dependencies {
    /// Read the settings, connect to OpenSearch and build the pipeline over
    /// the view catalog. See [`Settings::from_env`] for the variables read.
    ///
    /// Connection failures are only returned in fail-fast mode.
    pub async fn new() -> Result<Self, PipelineError> {
        let settings = Settings::from_env()?;

        info!(
            opensearch_url = %settings.opensearch_url,
            namespace = %settings.naming.namespace(),
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            compose_concurrency = settings.compose_concurrency,
            scan_page_size = settings.scan_page_size,
            "Initializing dependencies"
        );

        let registry = catalog::default_views()
            .map_err(|e| PipelineError::config(format!("Invalid view catalog: {}", e)))?;

        let provider = Self::connect_to_opensearch(
            &settings.opensearch_url,
            IndexConfig::default(),
            settings.connection_mode,
            settings.retry_interval,
        )
        .await?;

        info!("OpenSearch connection established");

        let pipeline = Pipeline::builder(Arc::new(provider), settings.naming.clone(), registry)
            .reader_config(settings.reader_config())
            .composer_config(settings.composer_config())
            .build();

        Ok(Self { settings, pipeline })
    }

    /// Ping OpenSearch until it answers, or once in fail-fast mode.
    async fn connect_to_opensearch(
        url: &str,
        index_config: IndexConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchProvider, PipelineError> {
        loop {
            match Self::try_connect_opensearch(url, index_config.clone()).await {
                Ok(provider) => return Ok(provider),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(PipelineError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    async fn try_connect_opensearch(
        url: &str,
        index_config: IndexConfig,
    ) -> Result<OpenSearchProvider, PipelineError> {
        let provider = OpenSearchProvider::new(url, index_config)
            .await
            .map_err(|e| PipelineError::config(format!("Failed to create OpenSearch provider: {}", e)))?;

        provider
            .ping()
            .await
            .map_err(|e| PipelineError::config(format!("OpenSearch is not reachable: {}", e)))?;

        Ok(provider)
    }
}
