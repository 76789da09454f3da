//! Aggregator bindings.
//!
//! A binding describes one key a view attaches to its documents: where the
//! value is read from, which index answers it, and how the answer is shaped.

use serde::Serialize;
use serde_json::Value;
use view_aggregator_shared::{IndexQuery, StatMetric};

/// Whether a field binding attaches one related document or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Exact-value conditions every related document must meet.
pub type Filters = Vec<(String, Value)>;

fn with_filters(query: IndexQuery, filters: &Filters) -> IndexQuery {
    filters.iter().fold(query, |query, (field, value)| {
        query.and(IndexQuery::term(field.clone(), value.clone()))
    })
}

/// Attach related documents found by matching a value of the view document.
///
/// The value at `source_path` is matched against `match_field` in the
/// `target_entity` index and the hits, projected to `projection`, are stored
/// under `target_key`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldBinding {
    pub target_key: String,
    pub source_path: String,
    pub target_entity: String,
    pub match_field: String,
    /// Fields kept from each related document. Empty keeps the whole document.
    pub projection: Vec<String>,
    pub cardinality: Cardinality,
    pub filters: Filters,
}

impl FieldBinding {
    /// A to-one relation matched on the target's `id`.
    pub fn one(
        target_key: impl Into<String>,
        source_path: impl Into<String>,
        target_entity: impl Into<String>,
    ) -> Self {
        Self {
            target_key: target_key.into(),
            source_path: source_path.into(),
            target_entity: target_entity.into(),
            match_field: "id".to_string(),
            projection: Vec::new(),
            cardinality: Cardinality::One,
            filters: Vec::new(),
        }
    }

    /// A to-many relation: every matching document is attached as an array.
    pub fn many(
        target_key: impl Into<String>,
        source_path: impl Into<String>,
        target_entity: impl Into<String>,
        match_field: impl Into<String>,
    ) -> Self {
        Self {
            match_field: match_field.into(),
            cardinality: Cardinality::Many,
            ..Self::one(target_key, source_path, target_entity)
        }
    }

    /// Match on a field other than `id`.
    pub fn matching(mut self, match_field: impl Into<String>) -> Self {
        self.match_field = match_field.into();
        self
    }

    pub fn project(mut self, fields: &[&str]) -> Self {
        self.projection = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Only keep related documents whose `field` equals `value`.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Whether the attached documents carry their own `id`.
    pub fn projects_id(&self) -> bool {
        self.projection.is_empty() || self.projection.iter().any(|f| f == "id")
    }

    /// Query selecting the related documents for `value`.
    pub fn related_query(&self, value: &Value) -> IndexQuery {
        let matcher = match value {
            Value::Array(values) => IndexQuery::terms(self.match_field.clone(), values.clone()),
            other => IndexQuery::term(self.match_field.clone(), other.clone()),
        };
        with_filters(matcher, &self.filters)
    }
}

/// The set of documents a stat binding aggregates over.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatScope {
    /// Every document of the target index.
    Global,
    /// Target documents whose `match_field` equals the view document's value
    /// at `source_path`.
    Scoped {
        source_path: String,
        match_field: String,
    },
}

/// Attach metric aggregations over a related index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatBinding {
    pub target_key: String,
    pub target_entity: String,
    pub scope: StatScope,
    pub metrics: Vec<StatMetric>,
    pub filters: Filters,
}

impl StatBinding {
    pub fn scoped(
        target_key: impl Into<String>,
        target_entity: impl Into<String>,
        source_path: impl Into<String>,
        match_field: impl Into<String>,
    ) -> Self {
        Self {
            target_key: target_key.into(),
            target_entity: target_entity.into(),
            scope: StatScope::Scoped {
                source_path: source_path.into(),
                match_field: match_field.into(),
            },
            metrics: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn global(target_key: impl Into<String>, target_entity: impl Into<String>) -> Self {
        Self {
            target_key: target_key.into(),
            target_entity: target_entity.into(),
            scope: StatScope::Global,
            metrics: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn metric(mut self, metric: StatMetric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Query selecting the documents aggregated for a scope value.
    ///
    /// `scope_value` is ignored for global stats.
    pub fn scope_query(&self, scope_value: Option<&Value>) -> IndexQuery {
        let scope = match (&self.scope, scope_value) {
            (StatScope::Scoped { match_field, .. }, Some(Value::Array(values))) => {
                IndexQuery::terms(match_field.clone(), values.clone())
            }
            (StatScope::Scoped { match_field, .. }, Some(value)) => {
                IndexQuery::term(match_field.clone(), value.clone())
            }
            _ => IndexQuery::MatchAll,
        };
        with_filters(scope, &self.filters)
    }
}

/// Replace a code field with the reference document it names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupBinding {
    pub field_path: String,
    pub reference_entity: String,
}

impl LookupBinding {
    pub fn new(field_path: impl Into<String>, reference_entity: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            reference_entity: reference_entity.into(),
        }
    }
}

/// Kind tag, used in logs and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorKind {
    Field,
    Stat,
    Lookup,
}

impl std::fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Field => write!(f, "field"),
            Self::Stat => write!(f, "stat"),
            Self::Lookup => write!(f, "lookup"),
        }
    }
}

/// One aggregator of a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Aggregator {
    Field(FieldBinding),
    Stat(StatBinding),
    Lookup(LookupBinding),
}

impl Aggregator {
    pub fn kind(&self) -> AggregatorKind {
        match self {
            Self::Field(_) => AggregatorKind::Field,
            Self::Stat(_) => AggregatorKind::Stat,
            Self::Lookup(_) => AggregatorKind::Lookup,
        }
    }

    /// The key this aggregator writes. Lookups write back to the field they read.
    pub fn target_key(&self) -> &str {
        match self {
            Self::Field(b) => &b.target_key,
            Self::Stat(b) => &b.target_key,
            Self::Lookup(b) => &b.field_path,
        }
    }

    /// The path read from the view document, if any.
    pub fn source_path(&self) -> Option<&str> {
        match self {
            Self::Field(b) => Some(&b.source_path),
            Self::Stat(StatBinding {
                scope: StatScope::Scoped { source_path, .. },
                ..
            }) => Some(source_path),
            Self::Stat(_) => None,
            Self::Lookup(b) => Some(&b.field_path),
        }
    }

    /// The entity whose index this aggregator queries.
    pub fn related_entity(&self) -> &str {
        match self {
            Self::Field(b) => &b.target_entity,
            Self::Stat(b) => &b.target_entity,
            Self::Lookup(b) => &b.reference_entity,
        }
    }
}

impl From<FieldBinding> for Aggregator {
    fn from(binding: FieldBinding) -> Self {
        Self::Field(binding)
    }
}

impl From<StatBinding> for Aggregator {
    fn from(binding: StatBinding) -> Self {
        Self::Stat(binding)
    }
}

impl From<LookupBinding> for Aggregator {
    fn from(binding: LookupBinding) -> Self {
        Self::Lookup(binding)
    }
}
