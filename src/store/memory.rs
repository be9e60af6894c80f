//! In-process store. Collections live in a shared map; filters are evaluated in Rust.

use crate::error::StoreError;
use crate::query::{Filter, FilterValue, Pattern, AND_GROUP, OR_GROUP};
use crate::store::{populate, Collection, Document, FindQuery, PopulatePath, Sort, SortDirection, Store};
use crate::store::{parse_id, CREATED_AT_FIELD};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(MemoryCollection {
            store: self.clone(),
            name: name.to_string(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

struct MemoryCollection {
    store: MemoryStore,
    name: String,
}

#[async_trait]
impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let patterns = Patterns::compile(&query.filter)?;
        let mut docs = {
            let collections = self.store.collections.read().await;
            let mut matched = Vec::new();
            for doc in collections.get(&self.name).into_iter().flatten() {
                if matches(&as_object(doc), &query.filter, &patterns)? {
                    matched.push(doc.clone());
                }
            }
            matched
        };
        if let Some(sort) = &query.sort {
            sort_documents(&mut docs, sort);
        }
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let take = query
            .limit
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        let mut docs: Vec<Document> = docs.into_iter().skip(skip).take(take).collect();
        populate(&self.store, &mut docs, &query.populate).await?;
        Ok(docs)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>, StoreError> {
        let collections = self.store.collections.read().await;
        Ok(collections
            .get(&self.name)
            .into_iter()
            .flatten()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }

    async fn count_documents(&self) -> Result<u64, StoreError> {
        let collections = self.store.collections.read().await;
        Ok(collections.get(&self.name).map(|docs| docs.len() as u64).unwrap_or(0))
    }

    async fn find_by_id(&self, id: Uuid, paths: &[PopulatePath]) -> Result<Option<Document>, StoreError> {
        let found = {
            let collections = self.store.collections.read().await;
            collections
                .get(&self.name)
                .and_then(|docs| docs.iter().find(|d| d.id == id).cloned())
        };
        let Some(doc) = found else {
            return Ok(None);
        };
        let mut docs = [doc];
        populate(&self.store, &mut docs, paths).await?;
        let [doc] = docs;
        Ok(Some(doc))
    }

    async fn save(&self, doc: &Document) -> Result<Document, StoreError> {
        let mut collections = self.store.collections.write().await;
        let docs = collections.entry(self.name.clone()).or_default();
        match docs.iter_mut().find(|d| d.id == doc.id) {
            Some(existing) => *existing = doc.clone(),
            None => docs.push(doc.clone()),
        }
        Ok(doc.clone())
    }

    async fn delete(&self, doc: &Document) -> Result<Document, StoreError> {
        let mut collections = self.store.collections.write().await;
        let docs = collections.get_mut(&self.name).ok_or(StoreError::MissingDocument(doc.id))?;
        let pos = docs
            .iter()
            .position(|d| d.id == doc.id)
            .ok_or(StoreError::MissingDocument(doc.id))?;
        Ok(docs.remove(pos))
    }
}

fn as_object(doc: &Document) -> Map<String, Value> {
    match doc.to_json() {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn matches(doc: &Map<String, Value>, filter: &Filter, patterns: &Patterns) -> Result<bool, StoreError> {
    for (key, expected) in filter.iter() {
        let ok = match key {
            OR_GROUP => {
                let mut any = false;
                for sub in group(key, expected)? {
                    if matches(doc, sub, patterns)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            AND_GROUP => {
                let mut all = true;
                for sub in group(key, expected)? {
                    if !matches(doc, sub, patterns)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            op if op.starts_with('$') => {
                return Err(StoreError::UnsupportedFilter(format!("unknown operator {}", op)));
            }
            field => field_matches(field, doc.get(field), expected, patterns)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn group<'a>(key: &str, value: &'a FilterValue) -> Result<&'a [Filter], StoreError> {
    match value {
        FilterValue::Group(items) => Ok(items),
        _ => Err(StoreError::UnsupportedFilter(format!("{} needs an array", key))),
    }
}

fn field_matches(
    field: &str,
    actual: Option<&Value>,
    expected: &FilterValue,
    patterns: &Patterns,
) -> Result<bool, StoreError> {
    Ok(match expected {
        FilterValue::Scalar(v) => match actual {
            Some(Value::Array(items)) if !v.is_array() => items.contains(v),
            Some(a) => a == v,
            None => v.is_null(),
        },
        FilterValue::Id(id) => match actual {
            Some(Value::Array(items)) => items.iter().any(|i| is_id(i, id)),
            Some(v) => is_id(v, id),
            None => false,
        },
        FilterValue::Regex(pattern) => {
            let re = patterns.get(field, pattern)?;
            match actual {
                Some(Value::String(s)) => re.is_match(s),
                Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).any(|s| re.is_match(s)),
                _ => false,
            }
        }
        FilterValue::Nested(sub) => match actual {
            Some(Value::Object(inner)) => matches(inner, sub, patterns)?,
            _ => false,
        },
        FilterValue::Group(_) => {
            return Err(StoreError::UnsupportedFilter(format!("group under field {}", field)));
        }
    })
}

fn is_id(value: &Value, id: &Uuid) -> bool {
    value.as_str().and_then(parse_id).as_ref() == Some(id)
}

/// Regexes of one filter, compiled once per query.
#[derive(Default)]
struct Patterns {
    compiled: HashMap<(String, bool), Regex>,
}

impl Patterns {
    fn compile(filter: &Filter) -> Result<Self, StoreError> {
        let mut patterns = Patterns::default();
        patterns.collect(filter)?;
        Ok(patterns)
    }

    fn collect(&mut self, filter: &Filter) -> Result<(), StoreError> {
        for (field, value) in filter.iter() {
            match value {
                FilterValue::Regex(pattern) => {
                    let key = (pattern.source.clone(), pattern.case_insensitive);
                    if !self.compiled.contains_key(&key) {
                        self.compiled.insert(key, compile(field, pattern)?);
                    }
                }
                FilterValue::Group(items) => {
                    for sub in items {
                        self.collect(sub)?;
                    }
                }
                FilterValue::Nested(sub) => self.collect(sub)?,
                FilterValue::Scalar(_) | FilterValue::Id(_) => {}
            }
        }
        Ok(())
    }

    fn get(&self, field: &str, pattern: &Pattern) -> Result<&Regex, StoreError> {
        self.compiled
            .get(&(pattern.source.clone(), pattern.case_insensitive))
            .ok_or_else(|| StoreError::UnsupportedFilter(format!("uncompiled regex for {}", field)))
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.compiled.len()
    }
}

fn compile(field: &str, pattern: &Pattern) -> Result<Regex, StoreError> {
    RegexBuilder::new(&pattern.source)
        .case_insensitive(pattern.case_insensitive)
        .build()
        .map_err(|e| StoreError::UnsupportedFilter(format!("invalid regex for {}: {}", field, e)))
}

fn sort_documents(docs: &mut [Document], sort: &Sort) {
    docs.sort_by(|a, b| {
        let ord = if sort.field == CREATED_AT_FIELD {
            a.created_at.cmp(&b.created_at)
        } else {
            compare_values(a.get(&sort.field).as_ref(), b.get(&sort.field).as_ref())
        };
        match sort.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

/// Missing and null sort first, then booleans, numbers, strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
