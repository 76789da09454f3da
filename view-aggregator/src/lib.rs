//! # View Aggregator
//!
//! Keeps denormalized view indices in sync with the normalized entity
//! indices they are built from.
//!
//! ## Architecture
//!
//! Views are declared as data and one generic executor runs them:
//!
//! 1. **Definition**: a view's source entity, projection and aggregators
//! 2. **Reader**: reads source, reference and view indices
//! 3. **Aggregator**: computes field, stat and lookup patches in stages
//! 4. **Composer**: builds view documents and writes them
//! 5. **Resync**: refreshes documents affected by a related change
//! 6. **Repair**: rebuilds whole view indices
//! 7. **Dispatch**: routes entity notifications to the above
//!
//! ## Modules
//!
//! - [`definition`]: View definitions, bindings and the registry
//! - [`catalog`]: The platform's views
//! - [`reader`]: Index reads
//! - [`aggregator`]: The generic aggregator executor
//! - [`composer`]: View composition
//! - [`resync`]: Reverse-sync
//! - [`repair`]: Full rebuilds
//! - [`dispatch`]: Entity notifications
//! - [`pipeline`]: Component wiring
//! - [`config`]: Configuration and dependency initialization
//! - [`errors`]: Error types for the pipeline

pub mod aggregator;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod definition;
pub mod dispatch;
pub mod errors;
pub mod pipeline;
pub mod reader;
pub mod repair;
pub mod resync;

pub use composer::{ComposeResult, ComposeSummary, ViewComposer, AGGREGATED_AT_FIELD};
pub use config::Dependencies;
pub use definition::{ViewDefinition, ViewRegistry};
pub use dispatch::{ChangeDispatcher, DispatchReport};
pub use errors::AggregationError;
pub use pipeline::Pipeline;
pub use repair::{RepairOrchestrator, RepairReport};
pub use resync::ReverseSync;

use thiserror::Error;

/// Errors that can occur during pipeline initialization or execution.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Aggregation error.
    #[error("Aggregation error: {0}")]
    AggregationError(#[from] AggregationError),

    /// The run finished, but not everything was written.
    #[error("Incomplete run: {0}")]
    Incomplete(String),
}

impl PipelineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create an incomplete run error.
    pub fn incomplete(msg: impl Into<String>) -> Self {
        Self::Incomplete(msg.into())
    }
}
