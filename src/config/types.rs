//! Model definition types matching the JSON model files.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-model controller configuration. Immutable once a controller is built.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerOptions {
    /// Whitelist of body keys copied into a document on create/update.
    pub field_names: Vec<String>,
    #[serde(default)]
    pub populate_fields: Vec<String>,
    #[serde(default)]
    pub field_names_search_filter: Vec<String>,
    #[serde(default)]
    pub field_names_search: Vec<String>,
    /// Informational only; list composition does not read it.
    #[serde(default)]
    pub list_extra_query_fields: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    pub name: String,
    /// Collection name; defaults to the lowercased model name.
    #[serde(default)]
    pub collection: Option<String>,
    /// URL path segment; defaults to the lowercased model name.
    #[serde(default)]
    pub path: Option<String>,
    /// Reference fields: field name -> referenced model name.
    #[serde(default)]
    pub references: HashMap<String, String>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    pub controller: ControllerOptions,
}

impl ModelDefinition {
    pub fn collection_name(&self) -> String {
        self.collection.clone().unwrap_or_else(|| self.name.to_lowercase())
    }

    pub fn path_segment(&self) -> String {
        self.path.clone().unwrap_or_else(|| self.name.to_lowercase())
    }
}
