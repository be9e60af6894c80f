//! Builds parameterized statements over one JSONB table per collection.
//!
//! Table layout: `id UUID PRIMARY KEY, doc JSONB, created_at, updated_at`.
//! Identifiers come from model configuration only; every value is a parameter.

use crate::error::StoreError;
use crate::query::{Filter, FilterValue, AND_GROUP, OR_GROUP};
use crate::store::params::PgBindValue;
use crate::store::{parse_id, Document, FindQuery, Sort, SortDirection, CREATED_AT_FIELD, ID_FIELD};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

const COLUMNS: &str = "id, doc, created_at";

/// Quote identifier for PostgreSQL (safe: only from config).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub(crate) fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Append a parameter and return its placeholder.
    fn push_param(&mut self, v: PgBindValue) -> String {
        self.params.push(v);
        format!("${}", self.params.len())
    }
}

/// SELECT matching documents with optional ORDER BY, LIMIT, OFFSET.
pub fn select_find(schema: &str, collection: &str, query: &FindQuery) -> Result<QueryBuf, StoreError> {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, collection);
    let where_clause = push_filter(&mut q, &query.filter)?;
    let order_clause = query
        .sort
        .as_ref()
        .map(|s| format!(" ORDER BY {}", order_expr(&mut q, s)))
        .unwrap_or_default();
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = if query.skip > 0 {
        format!(" OFFSET {}", query.skip)
    } else {
        String::new()
    };
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}{}{}{}",
        COLUMNS, table, where_clause, order_clause, limit_clause, offset_clause
    );
    Ok(q)
}

pub fn select_by_id(schema: &str, collection: &str, id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(PgBindValue::Uuid(id));
    q.sql = format!("SELECT {} FROM {} WHERE id = {}", COLUMNS, qualified_table(schema, collection), ph);
    q
}

pub fn select_by_ids(schema: &str, collection: &str, ids: &[Uuid]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(PgBindValue::UuidArray(ids.to_vec()));
    q.sql = format!(
        "SELECT {} FROM {} WHERE id = ANY({})",
        COLUMNS,
        qualified_table(schema, collection),
        ph
    );
    q
}

pub fn count_all(schema: &str, collection: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("SELECT COUNT(*) FROM {}", qualified_table(schema, collection));
    q
}

/// INSERT or replace the document body by id.
pub fn upsert(schema: &str, collection: &str, doc: &Document) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id = q.push_param(PgBindValue::Uuid(doc.id));
    let body = q.push_param(PgBindValue::Json(Value::Object(doc.fields.clone())));
    let created_at = q.push_param(PgBindValue::Timestamp(doc.created_at));
    q.sql = format!(
        "INSERT INTO {} (id, doc, created_at) VALUES ({}, {}, {}) \
         ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW() RETURNING {}",
        qualified_table(schema, collection),
        id,
        body,
        created_at,
        COLUMNS
    );
    q
}

pub fn delete_by_id(schema: &str, collection: &str, id: Uuid) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(PgBindValue::Uuid(id));
    q.sql = format!(
        "DELETE FROM {} WHERE id = {} RETURNING {}",
        qualified_table(schema, collection),
        ph,
        COLUMNS
    );
    q
}

/// DDL for one collection table and its indexes. Idempotent.
pub fn create_collection(schema: &str, collection: &str) -> Vec<String> {
    let table = qualified_table(schema, collection);
    vec![
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                doc JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            table
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} (created_at DESC)",
            quoted(&format!("{}_created_at_idx", collection)),
            table
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} USING GIN (doc jsonb_path_ops)",
            quoted(&format!("{}_doc_idx", collection)),
            table
        ),
    ]
}

fn order_expr(q: &mut QueryBuf, sort: &Sort) -> String {
    let expr = match sort.field.as_str() {
        CREATED_AT_FIELD => "created_at".to_string(),
        ID_FIELD => "id".to_string(),
        field => format!("doc -> {}", q.push_param(PgBindValue::Text(field.to_string()))),
    };
    match sort.direction {
        SortDirection::Ascending => format!("{} ASC", expr),
        SortDirection::Descending => format!("{} DESC", expr),
    }
}

/// Translate a filter into a boolean SQL expression, pushing its values.
fn push_filter(q: &mut QueryBuf, filter: &Filter) -> Result<String, StoreError> {
    let mut parts = Vec::new();
    for (key, value) in filter.iter() {
        let part = match key {
            OR_GROUP => push_group(q, key, value, " OR ", "FALSE")?,
            AND_GROUP => push_group(q, key, value, " AND ", "TRUE")?,
            op if op.starts_with('$') => {
                return Err(StoreError::UnsupportedFilter(format!("unknown operator {}", op)));
            }
            field => push_condition(q, field, value)?,
        };
        parts.push(part);
    }
    Ok(if parts.is_empty() {
        "TRUE".to_string()
    } else {
        parts.join(" AND ")
    })
}

fn push_group(
    q: &mut QueryBuf,
    key: &str,
    value: &FilterValue,
    separator: &str,
    when_empty: &str,
) -> Result<String, StoreError> {
    let FilterValue::Group(items) = value else {
        return Err(StoreError::UnsupportedFilter(format!("{} needs an array", key)));
    };
    if items.is_empty() {
        return Ok(when_empty.to_string());
    }
    let parts = items
        .iter()
        .map(|f| push_filter(q, f).map(|s| format!("({})", s)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("({})", parts.join(separator)))
}

fn push_condition(q: &mut QueryBuf, field: &str, value: &FilterValue) -> Result<String, StoreError> {
    match field {
        ID_FIELD => return push_id_condition(q, value),
        CREATED_AT_FIELD => return push_created_at_condition(q, value),
        _ => {}
    }
    match value {
        FilterValue::Scalar(v) => {
            let exact = q.push_param(PgBindValue::Json(single(field, v.clone())));
            if v.is_array() || v.is_object() {
                return Ok(format!("doc @> {}", exact));
            }
            let member = q.push_param(PgBindValue::Json(single(field, Value::Array(vec![v.clone()]))));
            Ok(format!("(doc @> {} OR doc @> {})", exact, member))
        }
        FilterValue::Id(id) => {
            let exact = q.push_param(PgBindValue::Json(single(field, Value::String(id.to_string()))));
            let member = q.push_param(PgBindValue::Json(single(
                field,
                Value::Array(vec![Value::String(id.to_string())]),
            )));
            Ok(format!("(doc @> {} OR doc @> {})", exact, member))
        }
        FilterValue::Regex(pattern) => {
            let f = q.push_param(PgBindValue::Text(field.to_string()));
            let p = q.push_param(PgBindValue::Text(pattern.source.clone()));
            let op = if pattern.case_insensitive { "~*" } else { "~" };
            // Strings match directly, arrays per string element.
            Ok(format!(
                "(CASE jsonb_typeof(doc -> {f}) \
                 WHEN 'string' THEN (doc ->> {f}) {op} {p} \
                 WHEN 'array' THEN EXISTS (SELECT 1 FROM jsonb_array_elements(doc -> {f}) AS e(v) \
                 WHERE jsonb_typeof(e.v) = 'string' AND (e.v #>> '{{}}') {op} {p}) \
                 ELSE FALSE END)",
                f = f,
                op = op,
                p = p
            ))
        }
        FilterValue::Nested(sub) => {
            let literal = sub
                .to_literal()
                .map_err(|e| StoreError::UnsupportedFilter(format!("{}: {}", field, e)))?;
            let ph = q.push_param(PgBindValue::Json(single(field, literal)));
            Ok(format!("doc @> {}", ph))
        }
        FilterValue::Group(_) => Err(StoreError::UnsupportedFilter(format!("group under field {}", field))),
    }
}

fn push_id_condition(q: &mut QueryBuf, value: &FilterValue) -> Result<String, StoreError> {
    let id = match value {
        FilterValue::Id(id) => Some(*id),
        FilterValue::Scalar(Value::String(s)) => parse_id(s),
        _ => return Err(StoreError::UnsupportedFilter(format!("{} needs an id", ID_FIELD))),
    };
    Ok(match id {
        Some(id) => format!("id = {}", q.push_param(PgBindValue::Uuid(id))),
        None => "FALSE".to_string(),
    })
}

fn push_created_at_condition(q: &mut QueryBuf, value: &FilterValue) -> Result<String, StoreError> {
    let parsed = match value {
        FilterValue::Scalar(Value::String(s)) => DateTime::parse_from_rfc3339(s).ok(),
        _ => None,
    };
    let at = parsed
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| StoreError::UnsupportedFilter(format!("{} needs an RFC 3339 timestamp", CREATED_AT_FIELD)))?;
    Ok(format!("created_at = {}", q.push_param(PgBindValue::Timestamp(at))))
}

fn single(field: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(field.to_string(), value);
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{search_group, Filter};
    use serde_json::json;

    fn find(filter: Filter) -> QueryBuf {
        select_find("app", "posts", &FindQuery::new(filter)).unwrap()
    }

    #[test]
    fn empty_filter_selects_everything() {
        let q = find(Filter::new());
        assert_eq!(q.sql, r#"SELECT id, doc, created_at FROM "app"."posts" WHERE TRUE"#);
        assert!(q.params.is_empty());
    }

    #[test]
    fn paging_and_sort() {
        let query = FindQuery::new(Filter::new())
            .sort(Sort::descending(CREATED_AT_FIELD))
            .limit(10)
            .skip(20);
        let q = select_find("app", "posts", &query).unwrap();
        assert!(q.sql.ends_with(" ORDER BY created_at DESC LIMIT 10 OFFSET 20"), "{}", q.sql);
    }

    #[test]
    fn search_group_becomes_or_of_regexes() {
        let filter = Filter::new().with(
            OR_GROUP,
            FilterValue::Group(search_group("a.b", &["title".to_string(), "body".to_string()])),
        );
        let q = find(filter);
        assert!(q.sql.contains("WHEN 'string' THEN (doc ->> $1) ~* $2"), "{}", q.sql);
        assert!(q.sql.contains(") OR ("), "{}", q.sql);
        assert!(q.sql.contains("WHEN 'string' THEN (doc ->> $3) ~* $4"), "{}", q.sql);
        assert_eq!(q.params.len(), 4);
        assert_eq!(q.params[1], PgBindValue::Text(r"a\.b".into()));
    }

    #[test]
    fn regex_on_array_field_matches_string_elements() {
        let filter = Filter::condition(
            "tags",
            FilterValue::Regex(crate::query::Pattern {
                source: "^ru".into(),
                case_insensitive: false,
            }),
        );
        let q = find(filter);
        assert!(
            q.sql.contains(
                "WHEN 'array' THEN EXISTS (SELECT 1 FROM jsonb_array_elements(doc -> $1) AS e(v) \
                 WHERE jsonb_typeof(e.v) = 'string' AND (e.v #>> '{}') ~ $2)"
            ),
            "{}",
            q.sql
        );
        assert!(q.sql.contains("ELSE FALSE END"), "{}", q.sql);
        assert_eq!(q.params, vec![PgBindValue::Text("tags".into()), PgBindValue::Text("^ru".into())]);
    }

    #[test]
    fn equality_uses_containment() {
        let q = find(Filter::from_json(&json!({"$and": [{"status": "open"}]})).unwrap());
        assert!(q.sql.ends_with("WHERE (((doc @> $1 OR doc @> $2)))"), "{}", q.sql);
        assert_eq!(q.params[0], PgBindValue::Json(json!({"status": "open"})));
        assert_eq!(q.params[1], PgBindValue::Json(json!({"status": ["open"]})));
    }

    #[test]
    fn id_field_targets_primary_key() {
        let id = Uuid::new_v4();
        let q = find(Filter::condition(ID_FIELD, FilterValue::Id(id)));
        assert!(q.sql.ends_with("WHERE id = $1"));
        assert_eq!(q.params, vec![PgBindValue::Uuid(id)]);
    }

    #[test]
    fn unknown_operator_fails() {
        let filter = Filter::from_json(&json!({"$where": "1"})).unwrap();
        assert!(select_find("app", "posts", &FindQuery::new(filter)).is_err());
    }

    #[test]
    fn identifiers_are_quoted() {
        let q = count_all("app", "we\"ird");
        assert_eq!(q.sql, r#"SELECT COUNT(*) FROM "app"."we""ird""#);
    }
}
