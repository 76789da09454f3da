//! Document model for source and view documents.
//!
//! Documents are plain JSON objects. Field access goes through dotted paths
//! (`saleTransaction.storeId`) so aggregators can read values attached by
//! other aggregators.

use serde_json::{Map, Value};

/// A JSON object as stored in a source or view index.
///
/// Backed by a sorted map, so serializing the same document twice always
/// yields the same bytes.
pub type Document = Map<String, Value>;

/// Dotted-path helpers over [`Document`].
pub mod path {
    use super::*;

    /// Get the value at a dotted path.
    ///
    /// Returns `None` if any segment is missing or an intermediate value is
    /// not an object.
    ///
    /// # Example
    ///
    /// ```
    /// use serde_json::json;
    /// use view_aggregator_shared::path;
    ///
    /// let doc = json!({"store": {"id": "s1"}});
    /// let doc = doc.as_object().unwrap();
    /// assert_eq!(path::get(doc, "store.id"), Some(&json!("s1")));
    /// assert_eq!(path::get(doc, "store.name"), None);
    /// ```
    pub fn get<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let mut current = doc.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Collect every value reachable at a dotted path, flattening arrays on the
    /// way, the same way a search engine flattens object arrays for term
    /// matching.
    pub fn collect<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
        let mut current: Vec<&Value> = Vec::new();
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return current;
        };
        if let Some(value) = doc.get(first) {
            push_flattened(&mut current, value);
        }
        for segment in segments {
            let mut next = Vec::new();
            for value in current {
                if let Some(child) = value.as_object().and_then(|o| o.get(segment)) {
                    push_flattened(&mut next, child);
                }
            }
            current = next;
        }
        current
    }

    fn push_flattened<'a>(out: &mut Vec<&'a Value>, value: &'a Value) {
        match value {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(other),
        }
    }

    /// Set the value at a dotted path.
    ///
    /// Intermediate objects are created when missing. Returns `false` when an
    /// intermediate segment exists but is not an object, in which case the
    /// document is left unchanged.
    pub fn set(doc: &mut Document, path: &str, value: Value) -> bool {
        match path.split_once('.') {
            None => {
                doc.insert(path.to_string(), value);
                true
            }
            Some((head, rest)) => {
                let child = doc
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                match child.as_object_mut() {
                    Some(child) => set(child, rest, value),
                    None => false,
                }
            }
        }
    }

    /// Remove the value at a dotted path, returning it if it was present.
    pub fn remove(doc: &mut Document, path: &str) -> Option<Value> {
        match path.split_once('.') {
            None => doc.remove(path),
            Some((head, rest)) => remove(doc.get_mut(head)?.as_object_mut()?, rest),
        }
    }

    /// The first segment of a dotted path.
    pub fn root(path: &str) -> &str {
        path.split('.').next().unwrap_or(path)
    }

    /// Whether `prefix` names `path` itself or one of its ancestors.
    ///
    /// `store` covers `store` and `store.id`, but not `storeId`.
    pub fn covers(prefix: &str, path: &str) -> bool {
        path == prefix
            || (path.len() > prefix.len()
                && path.starts_with(prefix)
                && path.as_bytes()[prefix.len()] == b'.')
    }

    /// Build a projected copy of a document containing only the given fields.
    ///
    /// Missing fields are omitted rather than set to null.
    pub fn project(doc: &Document, fields: &[String]) -> Document {
        let mut out = Document::new();
        for field in fields {
            if let Some(value) = get(doc, field) {
                set(&mut out, field, value.clone());
            }
        }
        out
    }
}
