//! Index naming.
//!
//! Every index the pipeline touches lives under one namespace prefix:
//! `<namespace>_<entity>`, lower-cased because the search engine rejects
//! upper-case index names.

use thiserror::Error;

/// Errors raised when building index names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NamingError {
    /// Namespace is empty.
    #[error("Namespace must not be empty")]
    EmptyNamespace,

    /// Namespace contains characters not allowed in an index name.
    #[error("Namespace '{0}' may only contain ASCII letters, digits, '-' and '_'")]
    InvalidNamespace(String),
}

/// Builds deterministic index names for source, reference and view indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNaming {
    namespace: String,
}

impl IndexNaming {
    /// Create a naming scheme for the given namespace.
    ///
    /// # Example
    ///
    /// ```
    /// use view_aggregator_shared::IndexNaming;
    ///
    /// let naming = IndexNaming::new("salesai1").unwrap();
    /// assert_eq!(naming.view_index("salesDashboardView"), "salesai1_salesdashboardview");
    /// assert_eq!(naming.entity_index("saleTransaction"), "salesai1_saletransaction");
    /// ```
    pub fn new(namespace: impl Into<String>) -> Result<Self, NamingError> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(NamingError::EmptyNamespace);
        }
        if !namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(NamingError::InvalidNamespace(namespace));
        }
        Ok(Self {
            namespace: namespace.to_lowercase(),
        })
    }

    /// The namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Index holding the normalized documents of an entity (or a lookup table).
    pub fn entity_index(&self, entity: &str) -> String {
        format!("{}_{}", self.namespace, entity.to_lowercase())
    }

    /// Destination index of a view.
    pub fn view_index(&self, view: &str) -> String {
        format!("{}_{}", self.namespace, view.to_lowercase())
    }
}
