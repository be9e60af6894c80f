//! Document validation from model rules, checked before a save reaches storage.

use crate::config::ValidationRule;
use crate::error::StoreError;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct DocumentValidator;

impl DocumentValidator {
    /// Validate a document's fields against per-field rules. Every required
    /// field must be present and non-null. Rules are checked in field-name
    /// order so the reported violation is deterministic.
    pub fn validate(fields: &Map<String, Value>, rules: &HashMap<String, ValidationRule>) -> Result<(), StoreError> {
        let mut ordered: Vec<_> = rules.iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(b.0));
        for (field, rule) in ordered {
            let val = fields.get(field);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(invalid(format!("{} is required", field)));
            }
            if let Some(v) = val {
                validate_field(field, v, rule)?;
            }
        }
        Ok(())
    }
}

fn invalid(message: String) -> StoreError {
    StoreError::Validation(message)
}

fn validate_field(field: &str, v: &Value, rule: &ValidationRule) -> Result<(), StoreError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(field, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(invalid(format!("{} must be at most {} characters", field, max)));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(invalid(format!("{} must be at least {} characters", field, min)));
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern).map_err(|_| invalid(format!("invalid pattern for {}", field)))?;
            if !re.is_match(s) {
                return Err(invalid(format!("{} does not match required pattern", field)));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(invalid(format!(
                "{} must be one of: {:?}",
                field,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(invalid(format!("{} must be at least {}", field, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(invalid(format!("{} must be at most {}", field, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(field: &str, v: &Value, format: &str) -> Result<(), StoreError> {
    let Some(s) = v.as_str() else {
        return Ok(());
    };
    match format.to_lowercase().as_str() {
        "email" => {
            if !s.contains('@') || s.len() < 3 {
                return Err(invalid(format!("{} must be a valid email", field)));
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err(invalid(format!("{} must be a valid UUID", field)));
            }
        }
        _ => {}
    }
    Ok(())
}
