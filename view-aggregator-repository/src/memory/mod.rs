//! In-memory implementation of the document index provider.
//!
//! Evaluates the shared query model directly over documents held in memory.
//! Used by the test suites and for dry runs without a search cluster.

mod matcher;
mod provider;

pub use matcher::matches;
pub use provider::InMemoryIndexProvider;
