//! Bind values for generated PostgreSQL statements.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use uuid::Uuid;

/// A value bound to a `$n` placeholder.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Text(String),
    Uuid(Uuid),
    UuidArray(Vec<Uuid>),
    /// Bound as JSONB.
    Json(Value),
    Timestamp(DateTime<Utc>),
}

/// Bind `params` in placeholder order.
pub fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [PgBindValue],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = match p {
            PgBindValue::Text(s) => query.bind(s.as_str()),
            PgBindValue::Uuid(u) => query.bind(*u),
            PgBindValue::UuidArray(ids) => query.bind(ids.as_slice()),
            PgBindValue::Json(v) => query.bind(sqlx::types::Json(v)),
            PgBindValue::Timestamp(t) => query.bind(*t),
        };
    }
    query
}
