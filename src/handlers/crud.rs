//! CRUD handlers: list, create, read, update, delete, plus the by-id resolution middleware.

use crate::controller::{CrudController, RequestContext};
use crate::error::AppError;
use crate::extractors::Actor;
use crate::state::AppState;
use crate::store::Document;
use axum::{
    extract::{Path, Query, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Documents resolved by [`resolve_item`], keyed by lowercased model name.
#[derive(Clone, Debug, Default)]
pub struct ResolvedItems(pub HashMap<String, Document>);

impl ResolvedItems {
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.0.get(key)
    }
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// The document the gate attached for `controller`'s model.
fn resolved(items: &ResolvedItems, controller: &CrudController) -> Result<Document, AppError> {
    items
        .get(&controller.context_key())
        .cloned()
        .ok_or(AppError::NotFound)
}

/// Runs `get` for `/:model/:id` and attaches the document before the handler.
pub async fn resolve_item(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    mut request: Request,
    next: Next,
) -> Response {
    let controller = match state.controller(&path_segment) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };
    let item = match controller.get(&id).await {
        Ok(item) => item,
        Err(e) => return e.into_response(),
    };
    let extensions = request.extensions_mut();
    match extensions.get_mut::<ResolvedItems>() {
        Some(items) => {
            items.0.insert(controller.context_key(), item);
        }
        None => {
            let mut items = ResolvedItems::default();
            items.0.insert(controller.context_key(), item);
            extensions.insert(items);
        }
    }
    next.run(request).await
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    let controller = state.controller(&path_segment)?;
    let ctx = RequestContext::new(actor.0, params);
    let listing = controller.list(&ctx).await?;
    Ok(Json(listing))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    actor: Actor,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let controller = state.controller(&path_segment)?;
    let body = body_to_map(body)?;
    let ctx = RequestContext::new(actor.0, params);
    let item = controller.create(&ctx, &body).await?;
    Ok(Json(item))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, _id)): Path<(String, String)>,
    Extension(items): Extension<ResolvedItems>,
) -> Result<impl IntoResponse, AppError> {
    let controller = state.controller(&path_segment)?;
    let item = resolved(&items, &controller)?;
    Ok(Json(controller.read(item)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, _id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    actor: Actor,
    Extension(items): Extension<ResolvedItems>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let controller: Arc<CrudController> = state.controller(&path_segment)?;
    let item = resolved(&items, &controller)?;
    let body = body_to_map(body)?;
    let ctx = RequestContext::new(actor.0, params);
    let item = controller.update(&ctx, item, &body).await?;
    Ok(Json(item))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, _id)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    actor: Actor,
    Extension(items): Extension<ResolvedItems>,
) -> Result<impl IntoResponse, AppError> {
    let controller = state.controller(&path_segment)?;
    let item = resolved(&items, &controller)?;
    let ctx = RequestContext::new(actor.0, params);
    let item = controller.delete(&ctx, item).await?;
    Ok(Json(item))
}
