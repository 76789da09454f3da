//! Declarative view definitions.
//!
//! A view is described once, as data: its source entity, the source fields it
//! copies and the aggregators that enrich each document. Composition,
//! reverse-sync and repair are all driven by the same definition.

mod binding;
mod registry;
mod view;

pub use binding::{
    Aggregator, AggregatorKind, Cardinality, FieldBinding, Filters, LookupBinding, StatBinding,
    StatScope,
};
pub use registry::{Dependent, ViewRegistry};
pub use view::{ViewDefinition, ViewDefinitionBuilder, ViewMode};
