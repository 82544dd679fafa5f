//! Schema and dataset loading.
//!
//! The schema file lists models:
//!
//! ```json
//! {"models": [{"name": "Beatle", "table": "beatles",
//!              "schema": {"hash_key": "realm", "sort_key": "id",
//!                         "attributes": {"realm": "string", "id": "string"}}}]}
//! ```
//!
//! The data file maps model names to arrays of records.

use std::fs;
use std::path::Path;

use dynorm_core::coerce::coerce_item;
use dynorm_core::{MemoryStore, ModelDef, ModelRegistry};
use dynorm_proto::item_from_json;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{CliError, Result};

#[derive(Debug, Deserialize)]
struct SchemaFile {
    models: Vec<ModelDef>,
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        what: path.display().to_string(),
        source,
    })
}

/// Build a registry from a schema file.
pub fn load_registry(path: &Path) -> Result<ModelRegistry> {
    let json = read_json(path)?;
    let file: SchemaFile = serde_json::from_value(json).map_err(|source| CliError::Json {
        what: path.display().to_string(),
        source,
    })?;

    let registry = ModelRegistry::new();
    for model in file.models {
        registry.register(model)?;
    }
    info!(path = %path.display(), models = registry.list().len(), "schema loaded");
    Ok(registry)
}

/// Create a table per registered model and load records from a data file.
///
/// Records are coerced to their declared attribute types on the way in.
pub fn load_store(registry: &ModelRegistry, path: &Path, page_size: usize) -> Result<MemoryStore> {
    let store = MemoryStore::with_page_size(page_size);
    for name in registry.list() {
        let model = registry.get(&name)?;
        store.create_table(model.table_name(), model.schema.clone());
    }

    let json = read_json(path)?;
    let serde_json::Value::Object(entries) = json else {
        return Err(CliError::Data(
            "expected an object mapping model names to record arrays".into(),
        ));
    };

    for (name, records) in &entries {
        let model = registry.get(name)?;
        let records = records
            .as_array()
            .ok_or_else(|| CliError::Data(format!("records for `{name}` must be an array")))?;
        for record in records {
            let item = coerce_item(item_from_json(record)?, &model.schema);
            store.put(model.table_name(), item)?;
        }
        debug!(model = %name, records = records.len(), "records loaded");
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    const SCHEMA: &str = r#"{"models": [{"name": "Beatle", "table": "beatles",
        "schema": {"hash_key": "realm", "sort_key": "id",
                   "attributes": {"realm": "string", "id": "string", "order": "number"}}}]}"#;

    #[test]
    fn test_load_registry_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let schema = write(&dir, "schema.json", SCHEMA);
        let data = write(
            &dir,
            "data.json",
            r#"{"Beatle": [{"realm": "beatles", "id": "1", "order": "2"},
                           {"realm": "beatles", "id": "2", "order": "1"}]}"#,
        );

        let registry = load_registry(&schema).unwrap();
        assert_eq!(registry.list(), vec!["Beatle".to_string()]);
        let store = load_store(&registry, &data, 10).unwrap();
        assert_eq!(store.item_count("beatles"), 2);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_registry(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn test_bad_data_shapes() {
        let dir = tempfile::tempdir().unwrap();
        let registry = load_registry(&write(&dir, "schema.json", SCHEMA)).unwrap();

        let data = write(&dir, "list.json", "[]");
        assert!(matches!(load_store(&registry, &data, 10), Err(CliError::Data(_))));

        let data = write(&dir, "unknown.json", r#"{"Drummer": []}"#);
        assert!(matches!(load_store(&registry, &data, 10), Err(CliError::Core(_))));

        let data = write(&dir, "nohash.json", r#"{"Beatle": [{"id": "1"}]}"#);
        assert!(matches!(load_store(&registry, &data, 10), Err(CliError::Store(_))));

        let data = write(&dir, "broken.json", "{");
        assert!(matches!(load_store(&registry, &data, 10), Err(CliError::Json { .. })));
    }
}
