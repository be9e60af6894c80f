//! PostgreSQL backend: one JSONB table per collection inside a dedicated schema.

use crate::config::ModelRegistry;
use crate::error::StoreError;
use crate::store::params::bind_all;
use crate::store::sql::{self, quoted, QueryBuf};
use crate::store::{populate, Collection, Document, FindQuery, PopulatePath, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: Arc<str>,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgStore {
            pool,
            schema: Arc::from(schema.into()),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Document>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Document>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_document).transpose()
    }
}

#[async_trait]
impl Store for PgStore {
    fn collection(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(PgCollection {
            store: self.clone(),
            name: name.to_string(),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

struct PgCollection {
    store: PgStore,
    name: String,
}

#[async_trait]
impl Collection for PgCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let q = sql::select_find(&self.store.schema, &self.name, query)?;
        let mut docs = self.store.fetch_all(&q).await?;
        populate(&self.store, &mut docs, &query.populate).await?;
        Ok(docs)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let q = sql::select_by_ids(&self.store.schema, &self.name, ids);
        self.store.fetch_all(&q).await
    }

    async fn count_documents(&self) -> Result<u64, StoreError> {
        let q = sql::count_all(&self.store.schema, &self.name);
        tracing::debug!(sql = %q.sql, "query");
        let (count,): (i64,) = sqlx::query_as(&q.sql).fetch_one(&self.store.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn find_by_id(&self, id: Uuid, paths: &[PopulatePath]) -> Result<Option<Document>, StoreError> {
        let q = sql::select_by_id(&self.store.schema, &self.name, id);
        let Some(doc) = self.store.fetch_optional(&q).await? else {
            return Ok(None);
        };
        let mut docs = [doc];
        populate(&self.store, &mut docs, paths).await?;
        let [doc] = docs;
        Ok(Some(doc))
    }

    async fn save(&self, doc: &Document) -> Result<Document, StoreError> {
        let q = sql::upsert(&self.store.schema, &self.name, doc);
        self.store
            .fetch_optional(&q)
            .await?
            .ok_or(StoreError::MissingDocument(doc.id))
    }

    async fn delete(&self, doc: &Document) -> Result<Document, StoreError> {
        let q = sql::delete_by_id(&self.store.schema, &self.name, doc.id);
        self.store
            .fetch_optional(&q)
            .await?
            .ok_or(StoreError::MissingDocument(doc.id))
    }
}

fn row_to_document(row: &PgRow) -> Result<Document, StoreError> {
    let id: Uuid = row.try_get("id")?;
    let sqlx::types::Json(fields): sqlx::types::Json<Map<String, Value>> = row.try_get("doc")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(Document {
        id,
        created_at,
        fields,
        populated: Default::default(),
    })
}

/// Create the schema and one table per registered collection (plus the
/// creators' collection). Safe to run on every start.
pub async fn ensure_collections(pool: &PgPool, schema: &str, registry: &ModelRegistry) -> Result<(), StoreError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
        .execute(pool)
        .await?;
    let collections: BTreeSet<String> = registry
        .models()
        .iter()
        .map(|m| m.collection_name())
        .chain(std::iter::once(registry.users_collection()))
        .collect();
    for collection in &collections {
        for ddl in sql::create_collection(schema, collection) {
            sqlx::query(&ddl).execute(pool).await?;
        }
        tracing::info!(schema = %schema, collection = %collection, "collection ready");
    }
    Ok(())
}
