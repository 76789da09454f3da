//! Query types for the document index.
//!
//! This module defines a small, backend-neutral query model. Providers
//! translate it into their own DSL (or evaluate it directly, for the
//! in-memory provider).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A filter over documents in one index.
///
/// Leaf queries are exact-value matches on a dotted field path, or a check
/// that the path holds a value at all. Array values match when any element
/// matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexQuery {
    /// Every document in the index.
    MatchAll,
    /// Field equals the value.
    Term { field: String, value: Value },
    /// Field equals any of the values.
    Terms { field: String, values: Vec<Value> },
    /// Field holds a non-null value (or a non-empty array).
    Exists { field: String },
    /// Every sub-query matches.
    All(Vec<IndexQuery>),
    /// At least one sub-query matches.
    Any(Vec<IndexQuery>),
}

impl IndexQuery {
    /// Documents whose `id` is one of `ids`.
    pub fn ids(ids: &[String]) -> Self {
        Self::terms("id", ids.iter().cloned().map(Value::String).collect())
    }

    /// Exact match on one value.
    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Exact match on any of several values.
    pub fn terms(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Terms {
            field: field.into(),
            values,
        }
    }

    /// Documents where `field` holds a value.
    pub fn exists(field: impl Into<String>) -> Self {
        Self::Exists {
            field: field.into(),
        }
    }

    /// Combine with another query so both must match.
    ///
    /// `MatchAll` is the identity, and nested conjunctions are flattened.
    ///
    /// # Example
    ///
    /// ```
    /// use view_aggregator_shared::IndexQuery;
    ///
    /// let q = IndexQuery::MatchAll.and(IndexQuery::term("storeId", "s1"));
    /// assert_eq!(q, IndexQuery::term("storeId", "s1"));
    /// ```
    pub fn and(self, other: IndexQuery) -> Self {
        match (self, other) {
            (Self::MatchAll, q) | (q, Self::MatchAll) => q,
            (Self::All(mut a), Self::All(b)) => {
                a.extend(b);
                Self::All(a)
            }
            (Self::All(mut a), q) | (q, Self::All(mut a)) => {
                a.push(q);
                Self::All(a)
            }
            (a, b) => Self::All(vec![a, b]),
        }
    }
}

/// A bounded search against one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: IndexQuery,
    /// Fields to return. `None` returns the whole document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<Vec<String>>,
    /// Maximum number of hits.
    pub size: usize,
}

impl SearchRequest {
    /// Default number of hits when no size is given.
    pub const DEFAULT_SIZE: usize = 10;

    pub fn new(query: IndexQuery) -> Self {
        Self {
            query,
            projection: None,
            size: Self::DEFAULT_SIZE,
        }
    }

    /// Restrict the returned fields.
    pub fn project(mut self, fields: &[String]) -> Self {
        self.projection = Some(fields.to_vec());
        self
    }

    /// Set the maximum number of hits.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }
}

/// Aggregate operation over one numeric or keyword field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatOp {
    /// Number of documents with a value in the field.
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// One named metric in a stat block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatMetric {
    /// Key of the metric in the resulting stat block.
    pub name: String,
    pub op: StatOp,
    pub field: String,
}

impl StatMetric {
    pub fn new(name: impl Into<String>, op: StatOp, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op,
            field: field.into(),
        }
    }

    pub fn count(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, StatOp::Count, field)
    }

    pub fn sum(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, StatOp::Sum, field)
    }

    pub fn avg(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, StatOp::Avg, field)
    }

    pub fn min(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, StatOp::Min, field)
    }

    pub fn max(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, StatOp::Max, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_and_flattens() {
        let a = IndexQuery::term("a", 1);
        let b = IndexQuery::term("b", 2);
        let c = IndexQuery::term("c", 3);

        let q = a.clone().and(b.clone()).and(c.clone());
        assert_eq!(q, IndexQuery::All(vec![a.clone(), b.clone(), c.clone()]));

        let q = IndexQuery::All(vec![a.clone()]).and(IndexQuery::All(vec![b.clone()]));
        assert_eq!(q, IndexQuery::All(vec![a, b]));
    }

    #[test]
    fn test_ids_query() {
        let q = IndexQuery::ids(&["s1".to_string(), "s2".to_string()]);
        assert_eq!(
            q,
            IndexQuery::Terms {
                field: "id".to_string(),
                values: vec![json!("s1"), json!("s2")],
            }
        );
    }

    #[test]
    fn test_search_request_defaults() {
        let r = SearchRequest::new(IndexQuery::MatchAll);
        assert_eq!(r.size, SearchRequest::DEFAULT_SIZE);
        assert!(r.projection.is_none());

        let r = r.project(&["id".to_string()]).size(3);
        assert_eq!(r.projection, Some(vec!["id".to_string()]));
        assert_eq!(r.size, 3);
    }
}
