//! Stored document: identity, creation time and free-form fields.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Stored values of fields replaced by population, keyed by field.
    #[serde(skip)]
    pub populated: HashMap<String, PopulatedField>,
}

/// A reference field as stored and as handed out after population.
#[derive(Clone, Debug, PartialEq)]
pub struct PopulatedField {
    pub raw: Value,
    pub resolved: Value,
}

impl Document {
    /// New unsaved document with a fresh id.
    pub fn new(fields: Map<String, Value>) -> Self {
        let mut doc = Document {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            fields: Map::new(),
            populated: HashMap::new(),
        };
        doc.apply(fields);
        doc
    }

    /// Field value, including the managed `_id` and `createdAt`.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            ID_FIELD => Some(Value::String(self.id.to_string())),
            CREATED_AT_FIELD => Some(Value::String(self.created_at_string())),
            _ => self.fields.get(field).cloned(),
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field != ID_FIELD && field != CREATED_AT_FIELD {
            self.fields.insert(field, value);
        }
    }

    /// Overlay `payload` onto this document; keys absent from it are kept.
    pub fn apply(&mut self, payload: Map<String, Value>) {
        for (k, v) in payload {
            self.set(k, v);
        }
    }

    /// Same rendering serde uses for `createdAt`.
    fn created_at_string(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Flat JSON object with `_id` and `createdAt` alongside the fields.
    pub fn to_json(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 2);
        map.insert(ID_FIELD.into(), Value::String(self.id.to_string()));
        map.insert(CREATED_AT_FIELD.into(), Value::String(self.created_at_string()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

/// Whether `raw` is a syntactically valid storage identifier.
pub fn is_valid_id(raw: &str) -> bool {
    parse_id(raw).is_some()
}

/// Native identifier for `raw`, if it is one.
pub fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_overrides_and_keeps_managed_fields() {
        let mut doc = Document::new(json!({"title": "a", "body": "b"}).as_object().unwrap().clone());
        let id = doc.id;
        doc.apply(json!({"title": "c", "_id": "nope"}).as_object().unwrap().clone());
        assert_eq!(doc.id, id);
        assert_eq!(doc.get("title"), Some(json!("c")));
        assert_eq!(doc.get("body"), Some(json!("b")));
    }

    #[test]
    fn serializes_flat() {
        let doc = Document::new(json!({"title": "a"}).as_object().unwrap().clone());
        let v = serde_json::to_value(&doc).unwrap();
        assert_eq!(v["_id"], json!(doc.id.to_string()));
        assert_eq!(v["title"], json!("a"));
        assert!(v.get("createdAt").is_some());
    }

    #[test]
    fn id_predicate() {
        assert!(is_valid_id(&Uuid::new_v4().to_string()));
        assert!(!is_valid_id("not-an-id"));
        assert!(!is_valid_id(""));
    }
}
