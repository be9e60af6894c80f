//! Document CRUD routes. `/:model/:id` routes run the by-id gate first.

use crate::handlers::crud::{create, delete as delete_handler, list, read, resolve_item, update};
use crate::state::AppState;
use axum::{middleware, routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Default request body cap for create and update.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

pub fn crud_routes(state: AppState) -> Router {
    crud_routes_with_limit(state, DEFAULT_BODY_LIMIT)
}

pub fn crud_routes_with_limit(state: AppState, body_limit: usize) -> Router {
    let by_id = Router::new()
        .route(
            "/:path_segment/:id",
            get(read).patch(update).put(update).delete(delete_handler),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), resolve_item));
    Router::new()
        .route("/:path_segment", get(list).post(create))
        .merge(by_id)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
