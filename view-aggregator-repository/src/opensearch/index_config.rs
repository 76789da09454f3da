//! OpenSearch index configuration.
//!
//! This module defines the settings used when the pipeline creates a view
//! index, and the scroll parameters used when scanning a whole index.

use serde_json::{json, Value};

/// Default scroll context lifetime between pages.
pub const DEFAULT_SCROLL_KEEP_ALIVE: &str = "1m";

/// Configuration for indices created by the provider and for scans.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Number of primary shards for new indices.
    pub number_of_shards: u32,
    /// Number of replicas for new indices.
    pub number_of_replicas: u32,
    /// How long the backend keeps a scroll context alive between pages.
    pub scroll_keep_alive: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 1,
            scroll_keep_alive: DEFAULT_SCROLL_KEEP_ALIVE.to_string(),
        }
    }
}

impl IndexConfig {
    /// Create a configuration with custom shard and replica counts.
    pub fn new(number_of_shards: u32, number_of_replicas: u32) -> Self {
        Self {
            number_of_shards,
            number_of_replicas,
            ..Self::default()
        }
    }

    /// Index settings and mappings for a view index.
    ///
    /// View documents are heterogeneous composites, so the mapping only pins
    /// the fields every view carries: `id` as a keyword for exact lookups and
    /// `_aggregatedAt` as a date. Dynamic mapping covers the rest, with
    /// strings mapped to keywords so reverse-sync term queries on nested
    /// relation ids (`storeInfo.id`) match exactly.
    pub fn view_index_settings(&self) -> Value {
        json!({
            "settings": {
                "number_of_shards": self.number_of_shards,
                "number_of_replicas": self.number_of_replicas
            },
            "mappings": {
                "dynamic_templates": [
                    {
                        "strings_as_keywords": {
                            "match_mapping_type": "string",
                            "mapping": { "type": "keyword" }
                        }
                    }
                ],
                "properties": {
                    "id": { "type": "keyword" },
                    "_aggregatedAt": { "type": "date" }
                }
            }
        })
    }
}
