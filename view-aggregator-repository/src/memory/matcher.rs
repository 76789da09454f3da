//! Query evaluation over in-memory documents.

use serde_json::Value;
use view_aggregator_shared::{path, Document, IndexQuery};

/// Exact-value equality, treating numbers by value (`1` equals `1.0`).
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}

fn field_matches(doc: &Document, field: &str, candidates: &[Value]) -> bool {
    path::collect(doc, field)
        .into_iter()
        .any(|value| candidates.iter().any(|c| values_equal(value, c)))
}

/// Evaluate `query` against one document.
///
/// Matching is exact on values. Text analysis is not modelled, so a term
/// only matches the stored value itself (or an element of a stored array).
pub fn matches(doc: &Document, query: &IndexQuery) -> bool {
    match query {
        IndexQuery::MatchAll => true,
        IndexQuery::Term { field, value } => field_matches(doc, field, std::slice::from_ref(value)),
        IndexQuery::Terms { field, values } => field_matches(doc, field, values),
        IndexQuery::Exists { field } => path::collect(doc, field).iter().any(|v| !v.is_null()),
        IndexQuery::All(queries) => queries.iter().all(|q| matches(doc, q)),
        IndexQuery::Any(queries) => queries.iter().any(|q| matches(doc, q)),
    }
}
