//! Translation of the shared query model into OpenSearch query DSL.

use serde_json::{json, Map, Value};
use view_aggregator_shared::{IndexQuery, StatMetric, StatOp};

/// Render an `IndexQuery` as an OpenSearch query object.
///
/// Leaf queries become `term`/`terms` queries; conjunctions use a
/// non-scoring `bool.filter` and disjunctions a `bool.should` with
/// `minimum_should_match: 1`.
pub fn query_to_dsl(query: &IndexQuery) -> Value {
    match query {
        IndexQuery::MatchAll => json!({ "match_all": {} }),
        IndexQuery::Term { field, value } => json!({ "term": { field: value } }),
        IndexQuery::Terms { field, values } => json!({ "terms": { field: values } }),
        IndexQuery::Exists { field } => json!({ "exists": { "field": field } }),
        IndexQuery::All(queries) => json!({
            "bool": {
                "filter": queries.iter().map(query_to_dsl).collect::<Vec<_>>()
            }
        }),
        IndexQuery::Any(queries) => json!({
            "bool": {
                "should": queries.iter().map(query_to_dsl).collect::<Vec<_>>(),
                "minimum_should_match": 1
            }
        }),
    }
}

fn op_name(op: StatOp) -> &'static str {
    match op {
        StatOp::Count => "value_count",
        StatOp::Sum => "sum",
        StatOp::Avg => "avg",
        StatOp::Min => "min",
        StatOp::Max => "max",
    }
}

/// Render stat metrics as an `aggs` object keyed by metric name.
pub fn metric_aggregations(metrics: &[StatMetric]) -> Value {
    let mut aggs = Map::new();
    for metric in metrics {
        aggs.insert(
            metric.name.clone(),
            json!({ op_name(metric.op): { "field": metric.field } }),
        );
    }
    Value::Object(aggs)
}
