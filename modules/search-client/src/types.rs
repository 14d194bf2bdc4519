use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query parameters for `POST /1/indexes/{index}/query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    pub page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,
    /// Outer list is AND, inner lists are OR.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facet_filters: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub numeric_filters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_values_per_facet: Option<u32>,
}

/// A search hit. Listing records are schemaless, so the hit keeps the raw
/// attribute map next to its object id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Hit {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Hit {
    pub fn str_attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn num_attr(&self, key: &str) -> Option<f64> {
        match self.attributes.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FacetStats {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub avg: Option<f64>,
    #[serde(default)]
    pub sum: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub hits: Vec<Hit>,
    pub nb_hits: u64,
    pub page: u32,
    pub nb_pages: u32,
    pub hits_per_page: u32,
    #[serde(rename = "processingTimeMS", default)]
    pub processing_time_ms: u64,
    /// attribute -> value -> count
    #[serde(default)]
    pub facets: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(rename = "facets_stats", default)]
    pub facets_stats: BTreeMap<String, FacetStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSettings {
    #[serde(default)]
    pub attributes_for_faceting: Vec<String>,
    #[serde(default)]
    pub searchable_attributes: Vec<String>,
    #[serde(default)]
    pub custom_ranking: Vec<String>,
    #[serde(default)]
    pub hits_per_page: Option<u32>,
}

impl IndexSettings {
    /// Facet attribute names with `searchable(...)`/`filterOnly(...)` wrappers removed.
    pub fn facet_attributes(&self) -> Vec<&str> {
        self.attributes_for_faceting
            .iter()
            .map(|raw| {
                raw.strip_suffix(')')
                    .and_then(|inner| inner.split_once('('))
                    .map(|(_, attr)| attr)
                    .unwrap_or(raw)
            })
            .collect()
    }
}
