//! View definitions and their build-time validation.

use std::collections::BTreeSet;

use serde::Serialize;
use view_aggregator_shared::path;

use super::binding::{Aggregator, FieldBinding, LookupBinding, StatBinding};
use crate::errors::AggregationError;

/// How a view's documents reach their readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Written to the view's own index and kept in sync.
    Materialized,
    /// Composed at read time and never written.
    OnDemand,
}

/// A denormalized view over one source entity.
///
/// Definitions are only obtainable through [`ViewDefinitionBuilder::build`],
/// which checks that aggregators write disjoint keys and orders them into
/// stages: an aggregator reading a key written by another one runs in a
/// later stage.
#[derive(Debug, Clone, Serialize)]
pub struct ViewDefinition {
    name: String,
    source_entity: String,
    projection: Vec<String>,
    mode: ViewMode,
    aggregators: Vec<Aggregator>,
    #[serde(skip)]
    stages: Vec<Vec<usize>>,
    #[serde(skip)]
    depends_on: Vec<Vec<usize>>,
}

impl ViewDefinition {
    pub fn builder(
        name: impl Into<String>,
        source_entity: impl Into<String>,
    ) -> ViewDefinitionBuilder {
        ViewDefinitionBuilder {
            name: name.into(),
            source_entity: source_entity.into(),
            projection: Vec::new(),
            mode: ViewMode::Materialized,
            aggregators: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_entity(&self) -> &str {
        &self.source_entity
    }

    /// Source fields copied onto every view document.
    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn is_materialized(&self) -> bool {
        self.mode == ViewMode::Materialized
    }

    pub fn aggregators(&self) -> &[Aggregator] {
        &self.aggregators
    }

    /// The aggregator writing `target_key`.
    pub fn aggregator(&self, target_key: &str) -> Option<&Aggregator> {
        self.aggregators
            .iter()
            .find(|a| a.target_key() == target_key)
    }

    /// Every aggregator, grouped by stage in execution order.
    pub fn stages(&self) -> Vec<Vec<&Aggregator>> {
        self.stages
            .iter()
            .map(|stage| stage.iter().map(|&i| &self.aggregators[i]).collect())
            .collect()
    }

    /// The aggregator writing `target_key` plus everything that reads its
    /// output, directly or transitively, grouped by stage.
    ///
    /// Returns `None` for an unknown key.
    pub fn rerun_stages(&self, target_key: &str) -> Option<Vec<Vec<&Aggregator>>> {
        let start = self
            .aggregators
            .iter()
            .position(|a| a.target_key() == target_key)?;

        let mut selected = BTreeSet::from([start]);
        let mut changed = true;
        while changed {
            changed = false;
            for (i, deps) in self.depends_on.iter().enumerate() {
                if !selected.contains(&i) && deps.iter().any(|d| selected.contains(d)) {
                    selected.insert(i);
                    changed = true;
                }
            }
        }

        Some(
            self.stages
                .iter()
                .map(|stage| {
                    stage
                        .iter()
                        .filter(|i| selected.contains(i))
                        .map(|&i| &self.aggregators[i])
                        .collect::<Vec<_>>()
                })
                .filter(|stage| !stage.is_empty())
                .collect(),
        )
    }

    /// Aggregators that query `entity`'s index.
    pub fn aggregators_reading(&self, entity: &str) -> impl Iterator<Item = &Aggregator> + '_ {
        let entity = entity.to_string();
        self.aggregators
            .iter()
            .filter(move |a| a.related_entity().eq_ignore_ascii_case(&entity))
    }
}

/// Builder for [`ViewDefinition`].
#[derive(Debug, Clone)]
pub struct ViewDefinitionBuilder {
    name: String,
    source_entity: String,
    projection: Vec<String>,
    mode: ViewMode,
    aggregators: Vec<Aggregator>,
}

impl ViewDefinitionBuilder {
    pub fn project(mut self, fields: &[&str]) -> Self {
        self.projection = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn on_demand(mut self) -> Self {
        self.mode = ViewMode::OnDemand;
        self
    }

    pub fn field(mut self, binding: FieldBinding) -> Self {
        self.aggregators.push(binding.into());
        self
    }

    pub fn stat(mut self, binding: StatBinding) -> Self {
        self.aggregators.push(binding.into());
        self
    }

    pub fn lookup(mut self, binding: LookupBinding) -> Self {
        self.aggregators.push(binding.into());
        self
    }

    /// Validate the definition and compute its stages.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationError::InvalidDefinition`] when:
    /// - the name or source entity is empty, or `id` is not projected
    /// - two aggregators write the same key, or one writes inside another's
    ///   key without reading it
    /// - a field or stat aggregator overwrites a projected source field
    /// - an aggregator reads a field that is neither projected nor written
    ///   by another aggregator
    /// - aggregators depend on each other in a cycle
    /// - a stat aggregator has no metrics or repeats a metric name
    pub fn build(self) -> Result<ViewDefinition, AggregationError> {
        let name = self.name.clone();
        let fail = |reason: String| AggregationError::invalid(name.clone(), reason);

        if self.name.trim().is_empty() {
            return Err(fail("view name is empty".to_string()));
        }
        if self.source_entity.trim().is_empty() {
            return Err(fail("source entity is empty".to_string()));
        }
        if !self.projection.iter().any(|f| f == "id") {
            return Err(fail("projection must include 'id'".to_string()));
        }

        let mut keys = BTreeSet::new();
        for aggregator in &self.aggregators {
            let key = aggregator.target_key();
            if key.is_empty() || key.split('.').any(str::is_empty) {
                return Err(fail(format!("invalid target key '{}'", key)));
            }
            if !keys.insert(key) {
                return Err(fail(format!("duplicate target key '{}'", key)));
            }
            if !matches!(aggregator, Aggregator::Lookup(_))
                && self.projection.iter().any(|f| f == path::root(key))
            {
                return Err(fail(format!(
                    "target key '{}' overwrites a projected source field",
                    key
                )));
            }
            if let Aggregator::Stat(stat) = aggregator {
                if stat.metrics.is_empty() {
                    return Err(fail(format!("stat '{}' has no metrics", key)));
                }
                let mut names = BTreeSet::new();
                for metric in &stat.metrics {
                    if !names.insert(metric.name.as_str()) {
                        return Err(fail(format!(
                            "stat '{}' repeats metric '{}'",
                            key, metric.name
                        )));
                    }
                }
            }
        }

        let depends_on = self.dependencies();

        for (i, aggregator) in self.aggregators.iter().enumerate() {
            let Some(source) = aggregator.source_path() else {
                continue;
            };
            if source.is_empty() || source.split('.').any(str::is_empty) {
                return Err(fail(format!("invalid source path '{}'", source)));
            }
            if depends_on[i].is_empty() && !self.projection.iter().any(|f| f == path::root(source)) {
                return Err(fail(format!(
                    "'{}' reads '{}', which is neither projected nor written by another aggregator",
                    aggregator.target_key(),
                    source
                )));
            }
        }

        // A key nested inside another aggregator's key is only safe if it
        // is written after that aggregator.
        for (i, inner) in self.aggregators.iter().enumerate() {
            for (j, outer) in self.aggregators.iter().enumerate() {
                if i != j
                    && path::covers(outer.target_key(), inner.target_key())
                    && !depends_on[i].contains(&j)
                {
                    return Err(fail(format!(
                        "'{}' is written inside '{}' without reading it",
                        inner.target_key(),
                        outer.target_key()
                    )));
                }
            }
        }

        let stages = self.stage_order(&depends_on).ok_or_else(|| {
            fail("aggregators depend on each other in a cycle".to_string())
        })?;

        Ok(ViewDefinition {
            name: self.name,
            source_entity: self.source_entity,
            projection: self.projection,
            mode: self.mode,
            aggregators: self.aggregators,
            stages,
            depends_on,
        })
    }

    /// For each aggregator, the aggregators whose key covers its source path.
    fn dependencies(&self) -> Vec<Vec<usize>> {
        self.aggregators
            .iter()
            .enumerate()
            .map(|(i, aggregator)| match aggregator.source_path() {
                Some(source) => self
                    .aggregators
                    .iter()
                    .enumerate()
                    .filter(|(j, other)| *j != i && path::covers(other.target_key(), source))
                    .map(|(j, _)| j)
                    .collect(),
                None => Vec::new(),
            })
            .collect()
    }

    /// Group aggregators into stages, or `None` if the dependencies cycle.
    fn stage_order(&self, depends_on: &[Vec<usize>]) -> Option<Vec<Vec<usize>>> {
        let count = self.aggregators.len();
        let mut level: Vec<Option<usize>> = vec![None; count];
        let mut placed = 0;

        while placed < count {
            let mut progressed = false;
            for i in 0..count {
                if level[i].is_some() {
                    continue;
                }
                let deps: Option<Vec<usize>> = depends_on[i].iter().map(|&d| level[d]).collect();
                if let Some(deps) = deps {
                    level[i] = Some(deps.into_iter().max().map_or(0, |l| l + 1));
                    placed += 1;
                    progressed = true;
                }
            }
            if !progressed {
                return None;
            }
        }

        let depth = level.iter().flatten().max().map_or(0, |l| l + 1);
        let mut stages = vec![Vec::new(); depth];
        for (i, l) in level.into_iter().enumerate() {
            if let Some(l) = l {
                stages[l].push(i);
            }
        }
        Some(stages)
    }
}
