//! Storage capability: collections of documents behind the `Store` / `Collection` traits.
//!
//! Two backends ship with the crate: [`PgStore`] keeps each collection in a
//! PostgreSQL JSONB table, [`MemoryStore`] keeps everything in process.

mod document;
mod memory;
mod params;
mod populate;
mod postgres;
mod sql;

pub use document::*;
pub use memory::MemoryStore;
pub use postgres::{ensure_collections, PgStore};
pub use populate::{depopulate, populate};

use crate::error::StoreError;
use crate::query::Filter;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn descending(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Sort {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }
}

/// Reference field to replace with the referenced document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PopulatePath {
    pub field: String,
    pub collection: String,
}

impl PopulatePath {
    pub fn new(field: impl Into<String>, collection: impl Into<String>) -> Self {
        PopulatePath {
            field: field.into(),
            collection: collection.into(),
        }
    }
}

/// A find request, built by chaining `limit`, `skip`, `sort` and `populate`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    /// `None` returns every match.
    pub limit: Option<u64>,
    pub skip: u64,
    pub sort: Option<Sort>,
    pub populate: Vec<PopulatePath>,
}

impl FindQuery {
    pub fn new(filter: Filter) -> Self {
        FindQuery {
            filter,
            ..Default::default()
        }
    }

    /// A limit of zero means no limit.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = (n > 0).then_some(n);
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = n;
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn populate(mut self, paths: impl IntoIterator<Item = PopulatePath>) -> Self {
        self.populate.extend(paths);
        self
    }
}

/// One named collection of documents.
#[async_trait]
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    async fn find(&self, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    /// Documents whose id is in `ids`, in no particular order. Used for population.
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>, StoreError>;

    /// Size of the whole collection.
    async fn count_documents(&self) -> Result<u64, StoreError>;

    async fn find_by_id(&self, id: Uuid, populate: &[PopulatePath]) -> Result<Option<Document>, StoreError>;

    /// Insert or replace by id. Returns the stored document.
    async fn save(&self, doc: &Document) -> Result<Document, StoreError>;

    /// Remove by id. Returns the removed document.
    async fn delete(&self, doc: &Document) -> Result<Document, StoreError>;
}

/// Storage session shared by every controller.
#[async_trait]
pub trait Store: Send + Sync {
    fn collection(&self, name: &str) -> Arc<dyn Collection>;

    /// Cheap liveness check for readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}
