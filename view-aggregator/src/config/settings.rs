//! Settings read from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;
use view_aggregator_shared::IndexNaming;

use crate::composer::ComposerConfig;
use crate::reader::ReaderConfig;
use crate::PipelineError;

use super::dependencies::ConnectionMode;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default namespace prefixed to every index name.
const DEFAULT_NAMESPACE: &str = "salesai1";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Default number of documents composed at the same time.
const DEFAULT_COMPOSE_CONCURRENCY: usize = 1;

/// Default page size when scanning an index.
const DEFAULT_SCAN_PAGE_SIZE: usize = 500;

/// Default cap on documents attached by one to-many relation.
const DEFAULT_RELATION_FETCH_LIMIT: usize = 1000;

/// Runtime settings of the pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    pub opensearch_url: String,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub naming: IndexNaming,
    pub compose_concurrency: usize,
    pub scan_page_size: usize,
    pub relation_fetch_limit: usize,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `VIEW_NAMESPACE`: Index name prefix (default: salesai1)
    /// - `COMPOSE_CONCURRENCY`: Documents composed at once (default: 1)
    /// - `SCAN_PAGE_SIZE`: Page size for index scans (default: 500)
    /// - `RELATION_FETCH_LIMIT`: Cap on to-many relations (default: 1000)
    ///
    /// Unparsable numbers fall back to their default with a warning. An
    /// invalid namespace is an error.
    pub fn from_env() -> Result<Self, PipelineError> {
        let namespace =
            env::var("VIEW_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let naming = IndexNaming::new(namespace)
            .map_err(|e| PipelineError::config(format!("Invalid VIEW_NAMESPACE: {}", e)))?;

        Ok(Self {
            opensearch_url: env::var("OPENSEARCH_URL")
                .unwrap_or_else(|_| DEFAULT_OPENSEARCH_URL.to_string()),
            connection_mode: ConnectionMode::from_env(),
            retry_interval: Duration::from_secs(parse_var(
                "OPENSEARCH_RETRY_INTERVAL_SECS",
                DEFAULT_RETRY_INTERVAL_SECS,
            )),
            naming,
            compose_concurrency: parse_var("COMPOSE_CONCURRENCY", DEFAULT_COMPOSE_CONCURRENCY)
                .max(1),
            scan_page_size: parse_var("SCAN_PAGE_SIZE", DEFAULT_SCAN_PAGE_SIZE).max(1),
            relation_fetch_limit: parse_var("RELATION_FETCH_LIMIT", DEFAULT_RELATION_FETCH_LIMIT)
                .max(1),
        })
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            scan_page_size: self.scan_page_size,
            relation_fetch_limit: self.relation_fetch_limit,
            ..ReaderConfig::default()
        }
    }

    pub fn composer_config(&self) -> ComposerConfig {
        ComposerConfig {
            id_concurrency: self.compose_concurrency,
        }
    }
}

fn parse_var<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "Invalid number, using default");
            default
        }),
        Err(_) => default,
    }
}
