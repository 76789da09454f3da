//! Id selectors.
//!
//! Every pipeline entry point accepts either a single id or a list of ids.

use serde::{Deserialize, Serialize};

/// One id or many ids, normalized to a list before querying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdSelector {
    One(String),
    Many(Vec<String>),
}

impl IdSelector {
    /// Normalize into a list of ids, dropping empty strings and duplicates
    /// while keeping first-seen order.
    ///
    /// # Example
    ///
    /// ```
    /// use view_aggregator_shared::IdSelector;
    ///
    /// assert_eq!(IdSelector::from("s1").into_vec(), vec!["s1".to_string()]);
    /// assert_eq!(
    ///     IdSelector::from(vec!["a", "b", "a", ""]).into_vec(),
    ///     vec!["a".to_string(), "b".to_string()]
    /// );
    /// ```
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            Self::One(id) => vec![id],
            Self::Many(ids) => ids,
        };
        let mut out: Vec<String> = Vec::with_capacity(raw.len());
        for id in raw {
            if !id.is_empty() && !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    /// Returns true if the selector names no usable id.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(id) => id.is_empty(),
            Self::Many(ids) => ids.iter().all(|id| id.is_empty()),
        }
    }
}

impl From<String> for IdSelector {
    fn from(id: String) -> Self {
        Self::One(id)
    }
}

impl From<&str> for IdSelector {
    fn from(id: &str) -> Self {
        Self::One(id.to_string())
    }
}

impl From<&String> for IdSelector {
    fn from(id: &String) -> Self {
        Self::One(id.clone())
    }
}

impl From<Vec<String>> for IdSelector {
    fn from(ids: Vec<String>) -> Self {
        Self::Many(ids)
    }
}

impl From<Vec<&str>> for IdSelector {
    fn from(ids: Vec<&str>) -> Self {
        Self::Many(ids.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for IdSelector {
    fn from(ids: &[String]) -> Self {
        Self::Many(ids.to_vec())
    }
}
