//! Field aggregators: attach related documents.

use serde_json::Value;
use view_aggregator_shared::{path, Document};

use super::Patch;
use crate::definition::{Cardinality, FieldBinding};
use crate::errors::AggregationError;
use crate::reader::SourceReader;

/// Attach the documents related to `doc` under the binding's target key.
///
/// A missing or null source value, or a query with no hits, unsets the key
/// so a relation that disappeared does not leave stale data behind.
pub(super) async fn aggregate(
    binding: &FieldBinding,
    reader: &SourceReader,
    doc: &Document,
) -> Result<Patch, AggregationError> {
    let unset = Patch::Unset(binding.target_key.clone());
    let value = match path::get(doc, &binding.source_path) {
        None | Some(Value::Null) => return Ok(unset),
        Some(Value::Array(items)) if items.is_empty() => return Ok(unset),
        Some(value) => value,
    };

    let index = reader.naming().entity_index(&binding.target_entity);
    let query = binding.related_query(value);

    match binding.cardinality {
        Cardinality::One => Ok(reader
            .find_first(&index, query, &binding.projection)
            .await?
            .map_or(unset, |related| {
                Patch::Set(binding.target_key.clone(), Value::Object(related))
            })),
        Cardinality::Many => {
            let related = reader
                .find_related(&index, query, &binding.projection)
                .await?;
            if related.is_empty() {
                return Ok(unset);
            }
            Ok(Patch::Set(
                binding.target_key.clone(),
                Value::Array(related.into_iter().map(Value::Object).collect()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{doc, reader};
    use super::*;
    use serde_json::json;

    fn assignments() -> Vec<Value> {
        vec![
            json!({"id": "a1", "userId": "u1", "storeId": "s1", "role": "seller", "status": "active"}),
            json!({"id": "a2", "userId": "u2", "storeId": "s1", "role": "manager", "status": "active"}),
            json!({"id": "a3", "userId": "u3", "storeId": "s1", "role": "seller", "status": "inactive"}),
            json!({"id": "a4", "userId": "u4", "storeId": "s2", "role": "seller", "status": "active"}),
        ]
    }

    #[tokio::test]
    async fn test_one_attaches_projected_document() {
        let (reader, _) = reader(vec![(
            "store",
            vec![json!({"id": "s1", "name": "Main", "city": "Izmir", "secret": true})],
        )])
        .await;
        let binding = FieldBinding::one("storeInfo", "storeId", "store").project(&["id", "name"]);

        let patch = aggregate(&binding, &reader, &doc(json!({"id": "t1", "storeId": "s1"})))
            .await
            .unwrap();
        assert_eq!(
            patch,
            Patch::Set("storeInfo".into(), json!({"id": "s1", "name": "Main"}))
        );
    }

    #[tokio::test]
    async fn test_many_applies_filters() {
        let (reader, _) = reader(vec![("storeAssignment", assignments())]).await;
        let binding = FieldBinding::many("activeSellers", "id", "storeAssignment", "storeId")
            .project(&["userId", "role", "status"])
            .filter("role", "seller")
            .filter("status", "active");

        let patch = aggregate(&binding, &reader, &doc(json!({"id": "s1"})))
            .await
            .unwrap();
        assert_eq!(
            patch,
            Patch::Set(
                "activeSellers".into(),
                json!([{"userId": "u1", "role": "seller", "status": "active"}])
            )
        );
    }

    #[tokio::test]
    async fn test_no_match_unsets_key() {
        let (reader, _) = reader(vec![("storeAssignment", assignments())]).await;
        let one = FieldBinding::one("storeInfo", "storeId", "store");
        let many = FieldBinding::many("staff", "id", "storeAssignment", "storeId");

        let d = doc(json!({"id": "s9", "storeId": "s9"}));
        assert_eq!(
            aggregate(&one, &reader, &d).await.unwrap(),
            Patch::Unset("storeInfo".into())
        );
        assert_eq!(
            aggregate(&many, &reader, &d).await.unwrap(),
            Patch::Unset("staff".into())
        );
    }

    #[tokio::test]
    async fn test_null_source_value_skips_query() {
        let (reader, provider) = reader(vec![]).await;
        let binding = FieldBinding::one("reviewedByUser", "reviewedByUserId", "user");
        let patch = aggregate(
            &binding,
            &reader,
            &doc(json!({"id": "e1", "reviewedByUserId": null})),
        )
        .await
        .unwrap();
        assert_eq!(patch, Patch::Unset("reviewedByUser".into()));
        assert_eq!(provider.writes(), 0);
    }
}
