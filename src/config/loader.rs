//! Load model definitions from JSON files and register them.

use crate::config::{validate, ModelDefinition, ModelRegistry};
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Read every model definition at `paths` into a validated registry. A path
/// may be a single JSON file or a directory whose `*.json` files are loaded
/// in name order.
pub async fn load_models<P: AsRef<Path>>(paths: &[P], users_model: &str) -> Result<ModelRegistry, ConfigError> {
    let mut registry = ModelRegistry::new(users_model);
    for path in paths {
        for file in model_files(path.as_ref()).await? {
            let definition = read_definition(&file).await?;
            tracing::info!(model = %definition.name, file = %file.display(), "registered model");
            registry.register(definition)?;
        }
    }
    validate(&registry)?;
    Ok(registry)
}

async fn model_files(path: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    if !meta.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut entries = tokio::fs::read_dir(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?
    {
        let p = entry.path();
        if p.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

async fn read_definition(file: &Path) -> Result<ModelDefinition, ConfigError> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", file.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", file.display(), e)))
}
