//! Registry of view definitions.

use std::sync::Arc;

use super::view::ViewDefinition;
use crate::errors::AggregationError;

/// An aggregator of a materialized view that reads a given entity.
#[derive(Debug, Clone)]
pub struct Dependent {
    pub view: Arc<ViewDefinition>,
    pub target_key: String,
}

/// Every known view, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ViewRegistry {
    views: Vec<Arc<ViewDefinition>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a view. Names are unique, ignoring case, since they share an
    /// index namespace once lower-cased.
    pub fn register(&mut self, view: ViewDefinition) -> Result<(), AggregationError> {
        if self
            .views
            .iter()
            .any(|v| v.name().eq_ignore_ascii_case(view.name()))
        {
            return Err(AggregationError::invalid(
                view.name(),
                "a view with this name is already registered",
            ));
        }
        self.views.push(Arc::new(view));
        Ok(())
    }

    /// Look a view up by name, ignoring case.
    pub fn get(&self, name: &str) -> Result<Arc<ViewDefinition>, AggregationError> {
        self.views
            .iter()
            .find(|v| v.name() == name)
            .or_else(|| self.views.iter().find(|v| v.name().eq_ignore_ascii_case(name)))
            .cloned()
            .ok_or_else(|| AggregationError::UnknownView(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ViewDefinition>> {
        self.views.iter()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Views written to their own index.
    pub fn materialized(&self) -> impl Iterator<Item = &Arc<ViewDefinition>> {
        self.views.iter().filter(|v| v.is_materialized())
    }

    /// Materialized views whose documents come from `entity`.
    pub fn sourced_from<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = &'a Arc<ViewDefinition>> + 'a {
        self.materialized()
            .filter(move |v| v.source_entity().eq_ignore_ascii_case(entity))
    }

    /// Every aggregator of a materialized view that reads `entity`.
    pub fn dependents(&self, entity: &str) -> Vec<Dependent> {
        self.materialized()
            .flat_map(|view| {
                view.aggregators_reading(entity)
                    .map(|a| Dependent {
                        view: Arc::clone(view),
                        target_key: a.target_key().to_string(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
