//! CrudController: list, get, read, create, update and delete for one model.

use crate::config::{ControllerOptions, ModelDefinition, ModelRegistry, CREATOR_FIELD};
use crate::controller::hooks::{CrudHooks, NoHooks, RequestContext};
use crate::controller::validation::DocumentValidator;
use crate::error::{AppError, ConfigError, StoreError};
use crate::query::compose_list_filter;
use crate::store::{depopulate, parse_id, Collection, Document, FindQuery, PopulatePath, Sort, Store, CREATED_AT_FIELD};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_LIMIT: u64 = 20;
pub const DEFAULT_PAGE: u64 = 1;

/// Which storage operation the dispatcher performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Save,
    Delete,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<Document>,
    /// Size of the whole collection, not of the filtered result.
    pub count: u64,
}

/// Pagination and search parameters read from the query string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListParams {
    pub limit: u64,
    pub page: u64,
    pub q: String,
}

impl ListParams {
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, AppError> {
        let limit = parse_number(query, "limit", DEFAULT_LIMIT)?;
        let page = parse_number(query, "page", DEFAULT_PAGE)?;
        if page == 0 {
            return Err(AppError::OperationFailed("page must be at least 1".into()));
        }
        Ok(ListParams {
            limit,
            page,
            q: query.get("q").cloned().unwrap_or_default(),
        })
    }

    pub fn skip(&self) -> Result<u64, AppError> {
        (self.page - 1)
            .checked_mul(self.limit)
            .ok_or_else(|| AppError::OperationFailed("page is out of range".into()))
    }
}

fn parse_number(query: &HashMap<String, String>, key: &str, default: u64) -> Result<u64, AppError> {
    match query.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::OperationFailed(format!("{} must be a non-negative integer, got '{}'", key, raw))),
        None => Ok(default),
    }
}

pub struct CrudController {
    model: Arc<ModelDefinition>,
    collection: Arc<dyn Collection>,
    /// Creator reference first, then the configured populate fields.
    populate: Vec<PopulatePath>,
    hooks: Arc<dyn CrudHooks>,
}

impl CrudController {
    /// Bind `model` to its collection in `store`. Populate targets are
    /// resolved against `registry` once, here.
    pub fn new(model: Arc<ModelDefinition>, registry: &ModelRegistry, store: &dyn Store) -> Result<Self, ConfigError> {
        let populate = registry.populate_paths(&model)?;
        let collection = store.collection(&model.collection_name());
        Ok(CrudController {
            model,
            collection,
            populate,
            hooks: Arc::new(NoHooks),
        })
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn CrudHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn model(&self) -> &ModelDefinition {
        &self.model
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.model.controller
    }

    /// Key under which a resolved document is attached to the request.
    pub fn context_key(&self) -> String {
        self.model.name.to_lowercase()
    }

    /// Paged, searched, filtered listing. Every failure is reported as a 400
    /// carrying the failure's message.
    pub async fn list(&self, ctx: &RequestContext) -> Result<ListResponse, AppError> {
        self.run_list(ctx).await.map_err(|e| {
            tracing::warn!(model = %self.model.name, error = %e, "list failed");
            match e {
                AppError::OperationFailed(_) => e,
                other => AppError::OperationFailed(other.to_string()),
            }
        })
    }

    async fn run_list(&self, ctx: &RequestContext) -> Result<ListResponse, AppError> {
        let params = ListParams::from_query(&ctx.query)?;
        let skip = params.skip()?;
        let extra = self.hooks.pre_list(ctx).await?;
        let filter = compose_list_filter(&params.q, &ctx.query, self.options(), extra);
        tracing::debug!(
            model = %self.model.name,
            filter = %filter.to_json(),
            limit = params.limit,
            skip,
            "list"
        );
        let query = FindQuery::new(filter)
            .limit(params.limit)
            .skip(skip)
            .sort(Sort::descending(CREATED_AT_FIELD))
            .populate(self.populate.iter().cloned());
        let (items, count) = tokio::try_join!(self.collection.find(&query), self.collection.count_documents())?;
        Ok(ListResponse { items, count })
    }

    /// Resolve a document by id. An invalid id never reaches storage; a
    /// storage failure is returned as-is for the generic error path.
    pub async fn get(&self, id: &str) -> Result<Document, AppError> {
        let id = parse_id(id).ok_or(AppError::InvalidIdentifier)?;
        self.collection
            .find_by_id(id, &self.populate)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub fn read(&self, item: Document) -> Document {
        item
    }

    pub async fn create(&self, ctx: &RequestContext, body: &Map<String, Value>) -> Result<Document, AppError> {
        let fields = self.pick_fields(body);
        let fields = self.hooks.pre_create(ctx, fields).await?;
        let mut item = Document::new(fields);
        item.set(CREATOR_FIELD, ctx.actor_value());
        self.dispatch(Intent::Save, item).await
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        mut item: Document,
        body: &Map<String, Value>,
    ) -> Result<Document, AppError> {
        let payload = self.pick_fields(body);
        let payload = self.hooks.pre_update(ctx, payload).await?;
        item.apply(payload);
        self.dispatch(Intent::Save, item).await
    }

    pub async fn delete(&self, ctx: &RequestContext, item: Document) -> Result<Document, AppError> {
        let item = self.hooks.pre_delete(ctx, item).await?;
        self.dispatch(Intent::Delete, item).await
    }

    /// Single path for every mutation: failures become a 400 with the
    /// failure's message. On success the item is returned as the caller
    /// holds it, populated references included.
    pub async fn dispatch(&self, intent: Intent, item: Document) -> Result<Document, AppError> {
        let outcome = match intent {
            Intent::Save => self.save(item).await,
            Intent::Delete => self.remove(item).await,
        };
        outcome.map_err(|e| {
            tracing::warn!(model = %self.model.name, ?intent, error = %e, "dispatch failed");
            AppError::OperationFailed(e.to_string())
        })
    }

    async fn save(&self, mut item: Document) -> Result<Document, StoreError> {
        let mut stored = item.clone();
        depopulate(&mut stored, &self.populate);
        DocumentValidator::validate(&stored.fields, &self.model.validation)?;
        let saved = self.collection.save(&stored).await?;
        item.created_at = saved.created_at;
        Ok(item)
    }

    async fn remove(&self, item: Document) -> Result<Document, StoreError> {
        self.collection.delete(&item).await?;
        Ok(item)
    }

    /// Copy only whitelisted keys present in `body`.
    fn pick_fields(&self, body: &Map<String, Value>) -> Map<String, Value> {
        self.options()
            .field_names
            .iter()
            .filter_map(|field| body.get(field).map(|v| (field.clone(), v.clone())))
            .collect()
    }
}
