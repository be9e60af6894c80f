//! Demo server: loads model files, prepares the database and serves CRUD routes.
//!
//! Run: `cargo run --example server` with `DATABASE_URL` and
//! `MODEL_PATHS=demos/models` set (or in `.env`).

use async_trait::async_trait;
use doc_crud::{
    common_routes, connect, crud_routes, disconnect, ensure_collections, ensure_database_exists, load_models,
    AppError, AppState, CrudHooks, Filter, FilterValue, PgStore, RequestContext, Settings,
};
use doc_crud::config::CREATOR_FIELD;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Lists only the caller's own notes; anonymous callers see nothing.
struct OwnedNotes;

#[async_trait]
impl CrudHooks for OwnedNotes {
    async fn pre_list(&self, ctx: &RequestContext) -> Result<Filter, AppError> {
        let owner = ctx.actor.ok_or_else(|| AppError::OperationFailed("an actor is required to list notes".into()))?;
        Ok(Filter::new().with(
            "$and",
            FilterValue::Group(vec![Filter::condition(CREATOR_FIELD, FilterValue::Scalar(Value::String(owner.to_string())))]),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("doc_crud=info,server=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let registry = load_models(&settings.model_paths, &settings.users_model).await?;

    ensure_database_exists(&settings.database.url).await?;
    let Some(pool) = connect(&settings.database).await else {
        return Err("database unavailable".into());
    };
    ensure_collections(&pool, &settings.database.schema, &registry).await?;

    let store = Arc::new(PgStore::new(pool.clone(), settings.database.schema.clone()));
    let mut hooks: HashMap<String, Arc<dyn CrudHooks>> = HashMap::new();
    if registry.get("Note").is_some() {
        hooks.insert("Note".into(), Arc::new(OwnedNotes));
    }
    let state = AppState::new(store, &registry, hooks)?;

    let app = common_routes(state.clone()).merge(crud_routes(state));
    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    disconnect(pool).await;
    Ok(())
}
