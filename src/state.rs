//! Shared application state: the store and one controller per registered model.

use crate::config::ModelRegistry;
use crate::controller::{CrudController, CrudHooks};
use crate::error::{AppError, ConfigError};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Keyed by URL path segment.
    controllers: Arc<HashMap<String, Arc<CrudController>>>,
}

impl AppState {
    /// Build a controller for every model in `registry`. `hooks` is keyed by
    /// model name; models without an entry get the pass-through hooks.
    pub fn new(
        store: Arc<dyn Store>,
        registry: &ModelRegistry,
        mut hooks: HashMap<String, Arc<dyn CrudHooks>>,
    ) -> Result<Self, ConfigError> {
        let mut controllers = HashMap::new();
        for model in registry.models() {
            let mut controller = CrudController::new(model.clone(), registry, store.as_ref())?;
            if let Some(h) = hooks.remove(&model.name) {
                controller = controller.with_hooks(h);
            }
            tracing::debug!(model = %model.name, path = %model.path_segment(), "controller ready");
            controllers.insert(model.path_segment(), Arc::new(controller));
        }
        if let Some(name) = hooks.keys().next() {
            return Err(ConfigError::MissingReference {
                kind: "model for hooks",
                id: name.clone(),
            });
        }
        Ok(AppState {
            store,
            controllers: Arc::new(controllers),
        })
    }

    pub fn controller(&self, path_segment: &str) -> Result<Arc<CrudController>, AppError> {
        self.controllers
            .get(path_segment)
            .cloned()
            .ok_or_else(|| AppError::UnknownModel(path_segment.to_string()))
    }
}
