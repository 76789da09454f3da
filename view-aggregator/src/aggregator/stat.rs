//! Stat aggregators: attach metric blocks.

use serde_json::Value;
use view_aggregator_shared::{path, Document};

use super::Patch;
use crate::definition::{StatBinding, StatScope};
use crate::errors::AggregationError;
use crate::reader::SourceReader;

/// Compute the binding's metrics and attach them as one object.
///
/// Scoped stats only count target documents related to `doc`. A scoped stat
/// whose scope value is missing unsets its key.
pub(super) async fn aggregate(
    binding: &StatBinding,
    reader: &SourceReader,
    doc: &Document,
) -> Result<Patch, AggregationError> {
    let scope_value = match &binding.scope {
        StatScope::Global => None,
        StatScope::Scoped { source_path, .. } => match path::get(doc, source_path) {
            None | Some(Value::Null) => return Ok(Patch::Unset(binding.target_key.clone())),
            Some(value) => Some(value),
        },
    };

    let index = reader.naming().entity_index(&binding.target_entity);
    let query = binding.scope_query(scope_value);
    let values = reader.stats(&index, &query, &binding.metrics).await?;

    Ok(Patch::Set(binding.target_key.clone(), Value::Object(values)))
}
