//! Lookup resolution: replace a code with its reference document.

use serde_json::{json, Value};
use view_aggregator_shared::{path, Document, IndexQuery};

use super::Patch;
use crate::definition::LookupBinding;
use crate::errors::AggregationError;
use crate::reader::SourceReader;

/// Replace the code at the binding's field with the reference document whose
/// `id` equals it.
///
/// A field that already holds a resolved document is looked up again by its
/// `id`. When no reference document exists the field becomes `{"id": code}`,
/// so a lookup field is an object in every view document and the index
/// mapping never sees a string where it mapped an object.
pub(super) async fn resolve(
    binding: &LookupBinding,
    reader: &SourceReader,
    doc: &Document,
) -> Result<Patch, AggregationError> {
    let code = match path::get(doc, &binding.field_path) {
        None | Some(Value::Null) | Some(Value::Array(_)) => return Ok(Patch::Keep),
        Some(Value::Object(current)) => match current.get("id") {
            Some(id) if !id.is_null() => id.clone(),
            _ => return Ok(Patch::Keep),
        },
        Some(code) => code.clone(),
    };

    let index = reader.naming().entity_index(&binding.reference_entity);
    let found = reader
        .find_first(&index, IndexQuery::term("id", code.clone()), &[])
        .await?;

    let resolved = match found {
        Some(reference) => Value::Object(reference),
        None => json!({ "id": code }),
    };
    Ok(Patch::Set(binding.field_path.clone(), resolved))
}
