//! Customization points run before each operation touches storage.

use crate::error::AppError;
use crate::query::Filter;
use crate::store::Document;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Per-request data visible to hooks.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    /// Authenticated actor, attached by an upstream auth layer.
    pub actor: Option<Uuid>,
    /// Query-string parameters.
    pub query: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(actor: Option<Uuid>, query: HashMap<String, String>) -> Self {
        RequestContext { actor, query }
    }

    /// The actor as stored on a document's creator field.
    pub fn actor_value(&self) -> Value {
        self.actor
            .map(|id| Value::String(id.to_string()))
            .unwrap_or(Value::Null)
    }
}

/// Four independent hooks. Each default is a pass-through, so an
/// implementation overrides only the ones it needs.
#[async_trait]
pub trait CrudHooks: Send + Sync {
    /// Whitelisted create payload before the document is built.
    async fn pre_create(&self, _ctx: &RequestContext, item: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
        Ok(item)
    }

    /// Whitelisted update payload before it is applied to the resolved document.
    async fn pre_update(&self, _ctx: &RequestContext, item: Map<String, Value>) -> Result<Map<String, Value>, AppError> {
        Ok(item)
    }

    async fn pre_delete(&self, _ctx: &RequestContext, item: Document) -> Result<Document, AppError> {
        Ok(item)
    }

    /// Extra filter fragment merged into the composed list filter.
    async fn pre_list(&self, _ctx: &RequestContext) -> Result<Filter, AppError> {
        Ok(Filter::new())
    }
}

/// Hooks that change nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl CrudHooks for NoHooks {}
