//! doc-crud: a generic CRUD controller over a document store, served with axum.

pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod query;
pub mod routes;
pub mod state;
pub mod store;

pub use config::{load_models, ControllerOptions, ModelDefinition, ModelRegistry, Settings};
pub use connection::{connect, disconnect, ensure_database_exists};
pub use controller::{CrudController, CrudHooks, Intent, ListResponse, NoHooks, RequestContext};
pub use error::{AppError, ConfigError, StoreError};
pub use query::{Filter, FilterValue};
pub use routes::{common_routes, crud_routes};
pub use state::AppState;
pub use store::{ensure_collections, Document, MemoryStore, PgStore, Store};
