//! Interface definitions for the document index provider.
//!
//! This module defines the abstract `DocumentIndexProvider` trait that allows
//! for dependency injection and swappable search backend implementations.

mod document_index_provider;

pub use document_index_provider::DocumentIndexProvider;
