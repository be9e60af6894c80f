//! Model validation: referential integrity and option consistency.

use crate::config::ModelRegistry;
use crate::error::ConfigError;
use crate::store::{CREATED_AT_FIELD, ID_FIELD};

pub fn validate(registry: &ModelRegistry) -> Result<(), ConfigError> {
    for model in registry.models() {
        for (field, target) in &model.references {
            if registry.get(target).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: "model",
                    id: format!("{} (referenced by {}.{})", target, model.name, field),
                });
            }
        }

        let options = &model.controller;
        for field in options
            .field_names
            .iter()
            .chain(&options.field_names_search)
            .chain(&options.field_names_search_filter)
            .chain(&options.populate_fields)
        {
            if field.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{}: empty field name", model.name)));
            }
        }
        for field in &options.field_names {
            if field == ID_FIELD || field == CREATED_AT_FIELD {
                return Err(ConfigError::Validation(format!(
                    "{}: {} is managed by the store and cannot be listed in fieldNames",
                    model.name, field
                )));
            }
        }
        for field in &options.populate_fields {
            if !model.references.contains_key(field) {
                return Err(ConfigError::MissingReference {
                    kind: "reference for populated field",
                    id: format!("{}.{}", model.name, field),
                });
            }
        }
        for (field, rule) in &model.validation {
            if let Some(pattern) = &rule.pattern {
                regex::Regex::new(pattern).map_err(|e| {
                    ConfigError::Validation(format!("{}.{}: invalid pattern: {}", model.name, field, e))
                })?;
            }
        }
    }
    Ok(())
}
