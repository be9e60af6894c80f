//! Replace reference ids with the documents they point to.

use crate::error::StoreError;
use crate::store::{parse_id, Document, PopulatedField, PopulatePath, Store, ID_FIELD};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Resolve every path on `docs` with one batched lookup per path. A single
/// reference whose target is gone becomes `null`; missing targets are
/// dropped from reference arrays. Values that are not ids are left alone.
/// The stored value of every replaced field is kept on the document.
pub async fn populate(store: &dyn Store, docs: &mut [Document], paths: &[PopulatePath]) -> Result<(), StoreError> {
    for path in paths {
        let mut ids = HashSet::new();
        for doc in docs.iter() {
            match doc.fields.get(&path.field) {
                Some(Value::String(s)) => ids.extend(parse_id(s)),
                Some(Value::Array(items)) => ids.extend(items.iter().filter_map(|v| v.as_str().and_then(parse_id))),
                _ => {}
            }
        }
        if ids.is_empty() {
            continue;
        }
        let ids: Vec<Uuid> = ids.into_iter().collect();
        let related = store.collection(&path.collection).find_by_ids(&ids).await?;
        tracing::debug!(
            field = %path.field,
            collection = %path.collection,
            requested = ids.len(),
            found = related.len(),
            "populate"
        );
        let by_id: HashMap<Uuid, Value> = related.into_iter().map(|d| (d.id, d.to_json())).collect();
        for doc in docs.iter_mut() {
            let Some(value) = doc.fields.get_mut(&path.field) else {
                continue;
            };
            let raw = value.clone();
            resolve(value, &by_id);
            if *value != raw {
                let resolved = value.clone();
                doc.populated
                    .entry(path.field.clone())
                    .or_insert(PopulatedField { raw, resolved });
            }
        }
    }
    Ok(())
}

/// Collapse populated references on `doc` back to their ids, so a document
/// read with population can be saved without persisting the related bodies.
/// A field still holding what population produced gets its stored value
/// back, including references whose targets no longer exist.
pub fn depopulate(doc: &mut Document, paths: &[PopulatePath]) {
    let populated = std::mem::take(&mut doc.populated);
    for path in paths {
        if let Some(value) = doc.fields.get_mut(&path.field) {
            if let Some(field) = populated.get(&path.field) {
                if *value == field.resolved {
                    *value = field.raw.clone();
                    continue;
                }
            }
            match value {
                Value::Object(_) => *value = reference_id(value),
                Value::Array(items) => {
                    for item in items.iter_mut() {
                        if item.is_object() {
                            *item = reference_id(item);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

fn reference_id(value: &Value) -> Value {
    value.get(ID_FIELD).cloned().unwrap_or_else(|| value.clone())
}

fn resolve(value: &mut Value, by_id: &HashMap<Uuid, Value>) {
    match value {
        Value::String(s) => {
            if let Some(id) = parse_id(s) {
                *value = by_id.get(&id).cloned().unwrap_or(Value::Null);
            }
        }
        Value::Array(items) => {
            let resolved = std::mem::take(items)
                .into_iter()
                .filter_map(|item| match item.as_str().and_then(parse_id) {
                    Some(id) => by_id.get(&id).cloned(),
                    None => Some(item),
                })
                .collect();
            *items = resolved;
        }
        _ => {}
    }
}
