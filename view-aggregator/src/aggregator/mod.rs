//! Generic aggregator executor.
//!
//! Each aggregator computes a [`Patch`] from a read-only view of the document.
//! All aggregators of a stage run concurrently, and their patches are applied
//! once the whole stage has completed. Target keys are disjoint, so the order
//! patches are applied in does not matter.

mod field;
mod lookup;
mod stat;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, warn};
use view_aggregator_shared::{path, Document};

use crate::definition::Aggregator;
use crate::errors::AggregationError;
use crate::reader::SourceReader;

/// Change to one key of a view document.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Write the value at the key.
    Set(String, Value),
    /// Make sure the key is absent.
    Unset(String),
    /// Leave the document as it is.
    Keep,
}

impl Patch {
    pub fn apply(self, doc: &mut Document) {
        match self {
            Self::Set(key, value) => {
                if !path::set(doc, &key, value) {
                    warn!(target_key = %key, "Cannot write below a non-object value");
                }
            }
            Self::Unset(key) => {
                path::remove(doc, &key);
            }
            Self::Keep => {}
        }
    }
}

/// Compute the patch for one aggregator.
pub async fn run(
    aggregator: &Aggregator,
    reader: &SourceReader,
    doc: &Document,
) -> Result<Patch, AggregationError> {
    let patch = match aggregator {
        Aggregator::Field(binding) => field::aggregate(binding, reader, doc).await?,
        Aggregator::Stat(binding) => stat::aggregate(binding, reader, doc).await?,
        Aggregator::Lookup(binding) => lookup::resolve(binding, reader, doc).await?,
    };
    debug!(
        kind = %aggregator.kind(),
        target_key = %aggregator.target_key(),
        patch = ?patch,
        "Aggregator finished"
    );
    Ok(patch)
}

/// Run the stages in order, applying each stage's patches to `doc`.
///
/// The first failing aggregator aborts the run. `doc` may then hold the
/// output of earlier stages and must not be written.
pub async fn run_stages(
    stages: &[Vec<&Aggregator>],
    reader: &SourceReader,
    doc: &mut Document,
) -> Result<(), AggregationError> {
    for stage in stages {
        let patches = {
            let snapshot = &*doc;
            try_join_all(stage.iter().map(|a| run(a, reader, snapshot))).await?
        };
        for patch in patches {
            patch.apply(doc);
        }
    }
    Ok(())
}
