//! Model registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::schema::KeySchema;
use crate::error::Error;

/// A registered model: its name, backing table and key schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    /// Model name used by callers.
    pub name: String,
    /// Backing table; defaults to the model name.
    #[serde(default)]
    pub table: Option<String>,
    /// Key metadata.
    pub schema: KeySchema,
}

impl ModelDef {
    /// Create a model stored in a table of the same name.
    pub fn new(name: impl Into<String>, schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            table: None,
            schema,
        }
    }

    /// Store the model in a differently named table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// The backing table name.
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }
}

/// Registry of models by name.
///
/// Models are validated on registration and immutable afterwards; the planner
/// only reads from the registry.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<ModelDef>>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a model.
    pub fn register(&self, model: ModelDef) -> Result<Arc<ModelDef>, Error> {
        model.schema.validate().map_err(|e| match e {
            Error::Configuration(msg) => {
                Error::Configuration(format!("model `{}`: {msg}", model.name))
            }
            other => other,
        })?;

        let mut models = self.models.write();
        if models.contains_key(&model.name) {
            return Err(Error::Configuration(format!(
                "model `{}` is already registered",
                model.name
            )));
        }

        debug!(
            model = %model.name,
            table = model.table_name(),
            hash_key = %model.schema.hash_key,
            sort_key = ?model.schema.sort_key,
            indexes = model.schema.indexes.len(),
            "registered model"
        );
        let model = Arc::new(model);
        models.insert(model.name.clone(), model.clone());
        Ok(model)
    }

    /// Look up a model by name.
    pub fn get(&self, name: &str) -> Result<Arc<ModelDef>, Error> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("unknown model `{name}`")))
    }

    /// Names of all registered models, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    fn user() -> ModelDef {
        ModelDef::new("User", KeySchema::new("id", ScalarType::String)).with_table("users")
    }

    #[test]
    fn test_register_and_get() {
        let registry = ModelRegistry::new();
        registry.register(user()).unwrap();

        let model = registry.get("User").unwrap();
        assert_eq!(model.table_name(), "users");
        assert_eq!(registry.list(), vec!["User".to_string()]);
    }

    #[test]
    fn test_table_defaults_to_name() {
        let model = ModelDef::new("Post", KeySchema::new("id", ScalarType::String));
        assert_eq!(model.table_name(), "Post");
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::new();
        assert!(matches!(registry.get("Nope"), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = ModelRegistry::new();
        registry.register(user()).unwrap();
        assert!(matches!(
            registry.register(user()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let registry = ModelRegistry::new();
        let mut model = user();
        model.schema.attributes.clear();
        let err = registry.register(model).unwrap_err();
        assert!(err.to_string().contains("model `User`"));
    }
}
