#![allow(dead_code)]

use async_trait::async_trait;
use doc_crud::config::{ControllerOptions, ModelDefinition, ModelRegistry, ValidationRule};
use doc_crud::error::StoreError;
use doc_crud::store::{Collection, Document, FindQuery, MemoryStore, PopulatePath, Store};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Everything a [`StubStore`] was asked to do.
#[derive(Debug, Default)]
pub struct CallLog {
    pub operations: Vec<String>,
    pub queries: Vec<FindQuery>,
}

const ALL_OPERATIONS: &[&str] = &[
    "ping",
    "find",
    "find_by_ids",
    "count_documents",
    "find_by_id",
    "save",
    "delete",
];

/// Wraps a [`MemoryStore`], recording calls. Operations named in `failing`
/// return `StoreError::Backend("boom")`.
#[derive(Clone)]
pub struct StubStore {
    pub inner: MemoryStore,
    pub log: Arc<Mutex<CallLog>>,
    failing: &'static [&'static str],
}

impl StubStore {
    pub fn new() -> Self {
        StubStore {
            inner: MemoryStore::new(),
            log: Arc::default(),
            failing: &[],
        }
    }

    pub fn failing() -> Self {
        Self::failing_on(ALL_OPERATIONS)
    }

    pub fn failing_on(operations: &'static [&'static str]) -> Self {
        StubStore {
            failing: operations,
            ..Self::new()
        }
    }

    pub fn operations(&self) -> Vec<String> {
        self.log.lock().unwrap().operations.clone()
    }

    pub fn last_query(&self) -> Option<FindQuery> {
        self.log.lock().unwrap().queries.last().cloned()
    }

    pub async fn seed(&self, collection: &str, docs: &[Document]) {
        let target = self.inner.collection(collection);
        for d in docs {
            target.save(d).await.unwrap();
        }
    }
}

#[async_trait]
impl Store for StubStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(StubCollection {
            inner: self.inner.collection(name),
            log: self.log.clone(),
            failing: self.failing,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.failing.contains(&"ping") {
            return Err(boom());
        }
        Ok(())
    }
}

struct StubCollection {
    inner: Arc<dyn Collection>,
    log: Arc<Mutex<CallLog>>,
    failing: &'static [&'static str],
}

fn boom() -> StoreError {
    StoreError::Backend("boom".into())
}

impl StubCollection {
    fn record(&self, op: &str) -> Result<(), StoreError> {
        self.log.lock().unwrap().operations.push(op.to_string());
        if self.failing.iter().any(|f| *f == op) {
            return Err(boom());
        }
        Ok(())
    }
}

#[async_trait]
impl Collection for StubCollection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        self.log.lock().unwrap().queries.push(query.clone());
        self.record("find")?;
        self.inner.find(query).await
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>, StoreError> {
        self.record("find_by_ids")?;
        self.inner.find_by_ids(ids).await
    }

    async fn count_documents(&self) -> Result<u64, StoreError> {
        self.record("count_documents")?;
        self.inner.count_documents().await
    }

    async fn find_by_id(&self, id: Uuid, populate: &[PopulatePath]) -> Result<Option<Document>, StoreError> {
        self.record("find_by_id")?;
        self.inner.find_by_id(id, populate).await
    }

    async fn save(&self, doc: &Document) -> Result<Document, StoreError> {
        self.record("save")?;
        self.inner.save(doc).await
    }

    async fn delete(&self, doc: &Document) -> Result<Document, StoreError> {
        self.record("delete")?;
        self.inner.delete(doc).await
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// `Note` (collection `notes`) referencing `Tag` (`tags`), plus `User` (`users`).
pub fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::default();
    registry
        .register(ModelDefinition {
            name: "User".into(),
            collection: Some("users".into()),
            path: None,
            references: HashMap::new(),
            validation: HashMap::new(),
            controller: ControllerOptions {
                field_names: strings(&["name"]),
                ..Default::default()
            },
        })
        .unwrap();
    registry
        .register(ModelDefinition {
            name: "Tag".into(),
            collection: Some("tags".into()),
            path: None,
            references: HashMap::new(),
            validation: HashMap::new(),
            controller: ControllerOptions {
                field_names: strings(&["label"]),
                ..Default::default()
            },
        })
        .unwrap();
    let mut validation = HashMap::new();
    validation.insert(
        "title".to_string(),
        ValidationRule {
            max_length: Some(20),
            ..Default::default()
        },
    );
    registry
        .register(ModelDefinition {
            name: "Note".into(),
            collection: Some("notes".into()),
            path: None,
            references: HashMap::from([("tags".to_string(), "Tag".to_string())]),
            validation,
            controller: ControllerOptions {
                field_names: strings(&["title", "status", "owner", "tags"]),
                populate_fields: strings(&["tags"]),
                field_names_search_filter: strings(&["status", "owner"]),
                field_names_search: strings(&["title"]),
                list_extra_query_fields: Vec::new(),
            },
        })
        .unwrap();
    registry
}

pub fn note(fields: Value) -> Document {
    Document::new(fields.as_object().cloned().unwrap_or_default())
}

pub fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
