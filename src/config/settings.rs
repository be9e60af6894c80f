//! Process settings from environment (`.env` is loaded by the entry point via dotenvy).

use crate::config::DEFAULT_USERS_MODEL;
use crate::error::ConfigError;
use std::path::PathBuf;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/doc_crud";
const DEFAULT_SCHEMA: &str = "doc_crud";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MODEL_PATHS: &str = "models";

#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    /// Log every statement at debug level.
    pub debug: bool,
    /// Schema holding one table per collection.
    pub schema: String,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub bind_addr: String,
    pub model_paths: Vec<PathBuf>,
    pub users_model: String,
}

impl Settings {
    /// Read `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`, `DATABASE_DEBUG`,
    /// `DOC_CRUD_SCHEMA`, `BIND_ADDR`, `MODEL_PATHS` (comma-separated) and
    /// `USERS_MODEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Validation(format!("DATABASE_MAX_CONNECTIONS: invalid number '{}'", v)))?,
            None => 5,
        };
        let debug = lookup("DATABASE_DEBUG")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        let schema = lookup("DOC_CRUD_SCHEMA").unwrap_or_else(|| DEFAULT_SCHEMA.into());
        if schema.is_empty() || !schema.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::Validation(format!("DOC_CRUD_SCHEMA: invalid schema name '{}'", schema)));
        }
        let model_paths = lookup("MODEL_PATHS")
            .unwrap_or_else(|| DEFAULT_MODEL_PATHS.into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();

        Ok(Settings {
            database: DatabaseSettings {
                url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
                max_connections,
                debug,
                schema,
            },
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            model_paths,
            users_model: lookup("USERS_MODEL").unwrap_or_else(|| DEFAULT_USERS_MODEL.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database.max_connections, 5);
        assert!(!s.database.debug);
        assert_eq!(s.model_paths, vec![PathBuf::from("models")]);
        assert_eq!(s.users_model, "User");
    }

    #[test]
    fn parses_overrides() {
        let s = settings(&[
            ("DATABASE_DEBUG", "true"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("MODEL_PATHS", "a, b/c.json,"),
        ])
        .unwrap();
        assert!(s.database.debug);
        assert_eq!(s.database.max_connections, 12);
        assert_eq!(s.model_paths, vec![PathBuf::from("a"), PathBuf::from("b/c.json")]);
    }

    #[test]
    fn rejects_unsafe_schema() {
        assert!(settings(&[("DOC_CRUD_SCHEMA", "x; drop")]).is_err());
    }
}
