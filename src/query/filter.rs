//! Closed filter-expression type used for list queries.
//!
//! A [`Filter`] is an ordered set of `key -> value` entries. Keys are either
//! field names or one of the group operators [`OR_GROUP`] / [`AND_GROUP`].
//! The JSON form mirrors the usual document-store shape:
//! `{"$or": [{"title": {"$regex": "abc", "$options": "i"}}], "owner": {"$id": "<uuid>"}}`.

use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub const OR_GROUP: &str = "$or";
pub const AND_GROUP: &str = "$and";

const REGEX_KEY: &str = "$regex";
const OPTIONS_KEY: &str = "$options";
const ID_KEY: &str = "$id";

#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    #[error("filter must be a JSON object")]
    NotAnObject,
    #[error("{0} must be an array of objects")]
    InvalidGroup(String),
    #[error("invalid {key} for field {field}")]
    InvalidOperand { field: String, key: &'static str },
    #[error("regex conditions cannot be converted to a literal value")]
    NotLiteral,
}

/// Regular-expression condition. `source` is matched as a regex, so callers
/// escape user input before building one.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    pub source: String,
    pub case_insensitive: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    /// Literal JSON value compared by equality.
    Scalar(Value),
    /// Native storage identifier.
    Id(Uuid),
    Regex(Pattern),
    /// Sub-filters combined by the enclosing group operator.
    Group(Vec<Filter>),
    Nested(Filter),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    entries: Vec<(String, FilterValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-entry equality condition `{field: value}`.
    pub fn condition(field: impl Into<String>, value: FilterValue) -> Self {
        Filter {
            entries: vec![(field.into(), value)],
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: FilterValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: FilterValue) {
        let key = key.into();
        match self.position(&key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<FilterValue> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    /// Parse the JSON form. Group operators must hold arrays of objects.
    pub fn from_json(value: &Value) -> Result<Self, FilterError> {
        let Value::Object(map) = value else {
            return Err(FilterError::NotAnObject);
        };
        let mut filter = Filter::new();
        for (key, v) in map {
            let parsed = if is_group_key(key) {
                let Value::Array(items) = v else {
                    return Err(FilterError::InvalidGroup(key.clone()));
                };
                let group = items
                    .iter()
                    .map(|item| Filter::from_json(item).map_err(|_| FilterError::InvalidGroup(key.clone())))
                    .collect::<Result<Vec<_>, _>>()?;
                FilterValue::Group(group)
            } else {
                parse_field_value(key, v)?
            };
            filter.insert(key.clone(), parsed);
        }
        Ok(filter)
    }

    /// Render the JSON form (inverse of [`Filter::from_json`]).
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.entries {
            let rendered = match value {
                FilterValue::Scalar(v) => v.clone(),
                FilterValue::Id(id) => serde_json::json!({ ID_KEY: id.to_string() }),
                FilterValue::Regex(p) => {
                    let options = if p.case_insensitive { "i" } else { "" };
                    serde_json::json!({ REGEX_KEY: p.source, OPTIONS_KEY: options })
                }
                FilterValue::Group(items) => Value::Array(items.iter().map(Filter::to_json).collect()),
                FilterValue::Nested(f) => f.to_json(),
            };
            map.insert(key.clone(), rendered);
        }
        Value::Object(map)
    }

    /// Literal JSON document this filter would match by containment. Ids
    /// become their string form; regexes and groups have no literal form.
    pub fn to_literal(&self) -> Result<Value, FilterError> {
        let mut map = Map::new();
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.to_literal()?);
        }
        Ok(Value::Object(map))
    }
}

impl FilterValue {
    pub fn to_literal(&self) -> Result<Value, FilterError> {
        match self {
            FilterValue::Scalar(v) => Ok(v.clone()),
            FilterValue::Id(id) => Ok(Value::String(id.to_string())),
            FilterValue::Nested(f) => f.to_literal(),
            FilterValue::Regex(_) | FilterValue::Group(_) => Err(FilterError::NotLiteral),
        }
    }
}

pub fn is_group_key(key: &str) -> bool {
    key == OR_GROUP || key == AND_GROUP
}

fn parse_field_value(field: &str, value: &Value) -> Result<FilterValue, FilterError> {
    let Value::Object(obj) = value else {
        return Ok(FilterValue::Scalar(value.clone()));
    };
    if let Some(source) = obj.get(REGEX_KEY) {
        let source = source.as_str().ok_or_else(|| FilterError::InvalidOperand {
            field: field.to_string(),
            key: REGEX_KEY,
        })?;
        let options = obj.get(OPTIONS_KEY).and_then(Value::as_str).unwrap_or("");
        return Ok(FilterValue::Regex(Pattern {
            source: source.to_string(),
            case_insensitive: options.contains('i'),
        }));
    }
    if let Some(id) = obj.get(ID_KEY) {
        let id = id
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| FilterError::InvalidOperand {
                field: field.to_string(),
                key: ID_KEY,
            })?;
        return Ok(FilterValue::Id(id));
    }
    Filter::from_json(value).map(FilterValue::Nested)
}

/// Drop `$or` / `$and` entries whose group is empty. Other keys pass through
/// unchanged and in order.
pub fn normalize_query(filter: Filter) -> Filter {
    Filter {
        entries: filter
            .entries
            .into_iter()
            .filter(|(key, value)| !(is_group_key(key) && group_len(value) == Some(0)))
            .collect(),
    }
}

fn group_len(value: &FilterValue) -> Option<usize> {
    match value {
        FilterValue::Group(items) => Some(items.len()),
        FilterValue::Scalar(Value::Array(items)) => Some(items.len()),
        _ => None,
    }
}

/// Deep-merge `extra` into `base`: groups and arrays concatenate, nested
/// filters merge recursively, anything else from `extra` overrides.
pub fn merge(mut base: Filter, extra: Filter) -> Filter {
    for (key, incoming) in extra.entries {
        match base.position(&key) {
            Some(i) => {
                let slot = &mut base.entries[i].1;
                let existing = std::mem::replace(slot, FilterValue::Scalar(Value::Null));
                *slot = merge_values(existing, incoming);
            }
            None => base.entries.push((key, incoming)),
        }
    }
    base
}

fn merge_values(existing: FilterValue, incoming: FilterValue) -> FilterValue {
    match (existing, incoming) {
        (FilterValue::Group(mut a), FilterValue::Group(b)) => {
            a.extend(b);
            FilterValue::Group(a)
        }
        (FilterValue::Scalar(Value::Array(mut a)), FilterValue::Scalar(Value::Array(b))) => {
            a.extend(b);
            FilterValue::Scalar(Value::Array(a))
        }
        (FilterValue::Nested(a), FilterValue::Nested(b)) => FilterValue::Nested(merge(a, b)),
        (_, incoming) => incoming,
    }
}
