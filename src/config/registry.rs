//! Registered model definitions, looked up by name and by path segment.

use crate::config::ModelDefinition;
use crate::error::ConfigError;
use crate::store::PopulatePath;
use std::collections::HashMap;
use std::sync::Arc;

/// Field on every document that references its creator.
pub const CREATOR_FIELD: &str = "user";

/// Model name the creator reference resolves to unless configured otherwise.
pub const DEFAULT_USERS_MODEL: &str = "User";

#[derive(Clone, Debug)]
pub struct ModelRegistry {
    models: Vec<Arc<ModelDefinition>>,
    by_name: HashMap<String, Arc<ModelDefinition>>,
    by_path: HashMap<String, Arc<ModelDefinition>>,
    users_model: String,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_USERS_MODEL)
    }
}

impl ModelRegistry {
    pub fn new(users_model: impl Into<String>) -> Self {
        ModelRegistry {
            models: Vec::new(),
            by_name: HashMap::new(),
            by_path: HashMap::new(),
            users_model: users_model.into(),
        }
    }

    pub fn register(&mut self, definition: ModelDefinition) -> Result<Arc<ModelDefinition>, ConfigError> {
        if self.by_name.contains_key(&definition.name) {
            return Err(ConfigError::DuplicateModel(definition.name));
        }
        let path = definition.path_segment();
        if self.by_path.contains_key(&path) {
            return Err(ConfigError::DuplicatePathSegment(path));
        }
        let definition = Arc::new(definition);
        self.by_name.insert(definition.name.clone(), definition.clone());
        self.by_path.insert(path, definition.clone());
        self.models.push(definition.clone());
        Ok(definition)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<ModelDefinition>> {
        self.by_name.get(name)
    }

    pub fn by_path(&self, path: &str) -> Option<&Arc<ModelDefinition>> {
        self.by_path.get(path)
    }

    pub fn models(&self) -> &[Arc<ModelDefinition>] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Collection holding creators. Falls back to the lowercased users model
    /// name when that model is not registered.
    pub fn users_collection(&self) -> String {
        self.get(&self.users_model)
            .map(|m| m.collection_name())
            .unwrap_or_else(|| self.users_model.to_lowercase())
    }

    /// Populate paths for a model: the creator reference first, then the
    /// configured `populateFields` in order.
    pub fn populate_paths(&self, model: &ModelDefinition) -> Result<Vec<PopulatePath>, ConfigError> {
        let mut paths = vec![PopulatePath::new(CREATOR_FIELD, self.users_collection())];
        for field in &model.controller.populate_fields {
            let target = model.references.get(field).ok_or_else(|| ConfigError::MissingReference {
                kind: "reference for populated field",
                id: format!("{}.{}", model.name, field),
            })?;
            let related = self.get(target).ok_or_else(|| ConfigError::MissingReference {
                kind: "model",
                id: target.clone(),
            })?;
            paths.push(PopulatePath::new(field.clone(), related.collection_name()));
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerOptions;

    fn model(name: &str) -> ModelDefinition {
        ModelDefinition {
            name: name.into(),
            collection: None,
            path: None,
            references: Default::default(),
            validation: Default::default(),
            controller: ControllerOptions::default(),
        }
    }

    #[test]
    fn rejects_duplicate_paths() {
        let mut registry = ModelRegistry::default();
        registry.register(model("Post")).unwrap();
        let mut other = model("Article");
        other.path = Some("post".into());
        assert!(matches!(registry.register(other), Err(ConfigError::DuplicatePathSegment(p)) if p == "post"));
    }

    #[test]
    fn populate_paths_resolve_references() {
        let mut registry = ModelRegistry::default();
        let mut user = model("User");
        user.collection = Some("people".into());
        registry.register(user).unwrap();
        registry.register(model("Category")).unwrap();
        let mut post = model("Post");
        post.references.insert("category".into(), "Category".into());
        post.controller.populate_fields = vec!["category".into()];
        let paths = registry.populate_paths(&post).unwrap();
        assert_eq!(
            paths,
            vec![PopulatePath::new("user", "people"), PopulatePath::new("category", "category")]
        );
    }

    #[test]
    fn populate_without_reference_is_rejected() {
        let registry = ModelRegistry::default();
        let mut post = model("Post");
        post.controller.populate_fields = vec!["category".into()];
        assert!(registry.populate_paths(&post).is_err());
    }
}
