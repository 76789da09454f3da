//! Reverse-sync.
//!
//! When a related entity changes, only the view documents that reference it
//! are refreshed, and only the aggregator reading that entity (plus those
//! reading its output) is run again. The affected documents are located
//! from the view definition itself.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, instrument};
use view_aggregator_shared::{path, IdSelector, IndexQuery};

use crate::composer::{ComposeResult, ComposeSummary, ViewComposer};
use crate::definition::{Aggregator, StatScope, ViewDefinition};
use crate::errors::AggregationError;
use crate::reader::SourceReader;

/// Re-runs single aggregators over the view documents they affect.
pub struct ReverseSync {
    reader: Arc<SourceReader>,
    composer: Arc<ViewComposer>,
    concurrency: usize,
}

impl ReverseSync {
    pub fn new(reader: Arc<SourceReader>, composer: Arc<ViewComposer>, concurrency: usize) -> Self {
        Self {
            reader,
            composer,
            concurrency: concurrency.max(1),
        }
    }

    /// Refresh the documents of `view` affected by changes to the related
    /// documents `changed_ids`, for the aggregator writing `target_key`.
    ///
    /// Documents that do not reference a changed id are not rewritten.
    #[instrument(skip(self, view, changed_ids), fields(view = %view.name()))]
    pub async fn resync(
        &self,
        view: &ViewDefinition,
        target_key: &str,
        changed_ids: impl Into<IdSelector>,
    ) -> Result<ComposeSummary, AggregationError> {
        if !view.is_materialized() {
            return Err(AggregationError::NotMaterialized(view.name().to_string()));
        }
        let (aggregator, stages) = match (view.aggregator(target_key), view.rerun_stages(target_key)) {
            (Some(aggregator), Some(stages)) => (aggregator, stages),
            _ => {
                return Err(AggregationError::UnknownRelation {
                    view: view.name().to_string(),
                    key: target_key.to_string(),
                })
            }
        };

        let ids = changed_ids.into().into_vec();
        if ids.is_empty() {
            return Ok(ComposeSummary::empty(view.name()));
        }

        let Some(query) = self.affected_query(aggregator, &ids).await? else {
            debug!("No view documents reference the changed ids");
            return Ok(ComposeSummary::empty(view.name()));
        };

        let view_index = self.reader.naming().view_index(view.name());
        let hits = self.reader.scan(&view_index, &query, None).await?;
        debug!(index = %view_index, affected = hits.len(), "Located affected view documents");

        let (view_index, stages) = (view_index.as_str(), stages.as_slice());
        let composer = &self.composer;
        let results: Vec<ComposeResult> = stream::iter(hits)
            .map(move |hit| composer.write_document(view_index, stages, hit.source))
            .buffered(self.concurrency)
            .collect()
            .await;

        let summary = ComposeSummary::from_results(view.name(), results);
        info!(
            index = %view_index,
            changed = ids.len(),
            rewritten = summary.succeeded,
            failed = summary.failed,
            "Resynced view documents"
        );
        Ok(summary)
    }

    /// Query over the view index selecting documents that reference one of
    /// `ids` through `aggregator`, or `None` if no document can.
    ///
    /// The related documents are read back for their current match values,
    /// which finds the view documents they belong to now. A related document
    /// that was deleted, or whose match value moved, is found through the
    /// projected `<target_key>.id` when there is one, and otherwise through
    /// every view document still holding the relation. Scoped stats widen to
    /// every document with a scope value once a related document is gone.
    pub async fn affected_query(
        &self,
        aggregator: &Aggregator,
        ids: &[String],
    ) -> Result<Option<IndexQuery>, AggregationError> {
        let id_values: Vec<Value> = ids.iter().cloned().map(Value::String).collect();

        let query = match aggregator {
            Aggregator::Field(binding) if binding.match_field == "id" => Some(IndexQuery::terms(
                binding.source_path.clone(),
                id_values,
            )),
            Aggregator::Field(binding) => {
                let related = self
                    .match_values(&binding.target_entity, &binding.match_field, ids)
                    .await?;
                let mut alternatives = Vec::new();
                if !related.values.is_empty() {
                    alternatives.push(IndexQuery::terms(
                        binding.source_path.clone(),
                        related.values,
                    ));
                }
                if binding.projects_id() {
                    alternatives.push(IndexQuery::terms(
                        format!("{}.id", binding.target_key),
                        id_values,
                    ));
                } else {
                    alternatives.push(IndexQuery::exists(binding.target_key.clone()));
                }
                any_of(alternatives)
            }
            Aggregator::Stat(binding) => match &binding.scope {
                StatScope::Global => Some(IndexQuery::MatchAll),
                StatScope::Scoped {
                    source_path,
                    match_field,
                } => {
                    let related = self
                        .match_values(&binding.target_entity, match_field, ids)
                        .await?;
                    let mut alternatives = Vec::new();
                    if !related.values.is_empty() {
                        alternatives.push(IndexQuery::terms(source_path.clone(), related.values));
                    }
                    if related.missing {
                        alternatives.push(IndexQuery::exists(source_path.clone()));
                    }
                    any_of(alternatives)
                }
            },
            Aggregator::Lookup(binding) => Some(IndexQuery::Any(vec![
                IndexQuery::terms(binding.field_path.clone(), id_values.clone()),
                IndexQuery::terms(format!("{}.id", binding.field_path), id_values),
            ])),
        };
        Ok(query)
    }

    /// Distinct values of `field` across the related documents `ids`.
    async fn match_values(
        &self,
        entity: &str,
        field: &str,
        ids: &[String],
    ) -> Result<RelatedValues, AggregationError> {
        let index = self.reader.naming().entity_index(entity);
        let documents = self
            .reader
            .fetch_by_ids(&index, ids.to_vec(), &[field.to_string()])
            .await?;
        let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let mut values: Vec<Value> = Vec::new();
        for doc in &documents {
            for value in path::collect(doc, field) {
                if !value.is_null() && !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        Ok(RelatedValues {
            values,
            missing: documents.len() < requested.len(),
        })
    }
}

/// Match values of the related documents that still exist.
struct RelatedValues {
    values: Vec<Value>,
    /// Some of the requested documents are no longer in the index.
    missing: bool,
}

fn any_of(mut alternatives: Vec<IndexQuery>) -> Option<IndexQuery> {
    match alternatives.len() {
        0 => None,
        1 => alternatives.pop(),
        _ => Some(IndexQuery::Any(alternatives)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::test_support::reader;
    use crate::definition::{FieldBinding, LookupBinding, StatBinding};
    use serde_json::json;
    use view_aggregator_shared::{FixedClock, StatMetric};

    async fn resync() -> ReverseSync {
        let (reader, provider) = reader(vec![(
            "storeAssignment",
            vec![
                json!({"id": "a1", "storeId": "s1", "role": "seller"}),
                json!({"id": "a2", "storeId": "s2", "role": "seller"}),
                json!({"id": "a3", "storeId": "s1", "role": "manager"}),
            ],
        )])
        .await;
        let reader = Arc::new(reader);
        let composer = Arc::new(ViewComposer::new(
            reader.clone(),
            provider,
            Arc::new(FixedClock(chrono::Utc::now())),
        ));
        ReverseSync::new(reader, composer, 1)
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_field_on_id_matches_source_path() {
        let sync = resync().await;
        let binding: Aggregator = FieldBinding::one("storeInfo", "storeId", "store").into();
        assert_eq!(
            sync.affected_query(&binding, &ids(&["s1"])).await.unwrap(),
            Some(IndexQuery::terms("storeId", vec![json!("s1")]))
        );
    }

    #[tokio::test]
    async fn test_field_on_foreign_key_resolves_match_values() {
        let sync = resync().await;
        let binding: Aggregator = FieldBinding::many("activeSellers", "id", "storeAssignment", "storeId")
            .project(&["userId", "role", "status"])
            .into();
        assert_eq!(
            sync.affected_query(&binding, &ids(&["a1", "a2", "a3"])).await.unwrap(),
            Some(IndexQuery::Any(vec![
                IndexQuery::terms("id", vec![json!("s1"), json!("s2")]),
                IndexQuery::exists("activeSellers"),
            ]))
        );
    }

    #[tokio::test]
    async fn test_removed_related_document_without_projected_id() {
        let sync = resync().await;
        let binding: Aggregator = FieldBinding::many("activeSellers", "id", "storeAssignment", "storeId")
            .project(&["userId", "role", "status"])
            .into();
        assert_eq!(
            sync.affected_query(&binding, &ids(&["gone"])).await.unwrap(),
            Some(IndexQuery::exists("activeSellers"))
        );
    }

    #[tokio::test]
    async fn test_removed_related_document_found_through_its_id() {
        let sync = resync().await;
        let binding: Aggregator = FieldBinding::many("staff", "id", "storeAssignment", "storeId")
            .project(&["id", "role"])
            .into();
        assert_eq!(
            sync.affected_query(&binding, &ids(&["gone"])).await.unwrap(),
            Some(IndexQuery::terms("staff.id", vec![json!("gone")]))
        );
    }

    #[tokio::test]
    async fn test_stat_and_lookup_queries() {
        let sync = resync().await;
        let scoped: Aggregator = StatBinding::scoped("staffCount", "storeAssignment", "id", "storeId")
            .metric(StatMetric::count("n", "id"))
            .into();
        assert_eq!(
            sync.affected_query(&scoped, &ids(&["a2"])).await.unwrap(),
            Some(IndexQuery::terms("id", vec![json!("s2")]))
        );
        assert_eq!(
            sync.affected_query(&scoped, &ids(&["a2", "gone"])).await.unwrap(),
            Some(IndexQuery::Any(vec![
                IndexQuery::terms("id", vec![json!("s2")]),
                IndexQuery::exists("id"),
            ]))
        );

        let global: Aggregator = StatBinding::global("all", "storeAssignment")
            .metric(StatMetric::count("n", "id"))
            .into();
        assert_eq!(
            sync.affected_query(&global, &ids(&["a2"])).await.unwrap(),
            Some(IndexQuery::MatchAll)
        );

        let lookup: Aggregator = LookupBinding::new("severity", "auditLogSeverity").into();
        assert_eq!(
            sync.affected_query(&lookup, &ids(&["critical"])).await.unwrap(),
            Some(IndexQuery::Any(vec![
                IndexQuery::terms("severity", vec![json!("critical")]),
                IndexQuery::terms("severity.id", vec![json!("critical")]),
            ]))
        );
    }

    #[tokio::test]
    async fn test_unknown_relation() {
        let sync = resync().await;
        let view = ViewDefinition::builder("v", "store")
            .project(&["id"])
            .build()
            .unwrap();
        assert!(matches!(
            sync.resync(&view, "storeInfo", "s1").await,
            Err(AggregationError::UnknownRelation { .. })
        ));
    }
}
