//! Key schema definitions.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::types::ScalarType;
use crate::error::Error;

/// Hash attribute used when a model declares none.
pub const DEFAULT_HASH_KEY: &str = "id";

fn default_hash_key() -> String {
    DEFAULT_HASH_KEY.to_string()
}

/// Where a secondary index lives relative to the base table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Shares the table's partition (hash) attribute.
    Local,
    /// Partitioned by its own hash attribute.
    Global,
}

/// A secondary index descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    /// Index name as known to the store.
    pub name: String,
    /// Partition attribute of the index.
    pub hash_key: String,
    /// Sort attribute of the index.
    pub sort_key: String,
    /// Local or global placement.
    pub kind: IndexKind,
}

impl SecondaryIndex {
    /// A local index sorted by `sort_key`, named `{sort_key}LocalIndex`.
    pub fn local(primary_hash: impl Into<String>, sort_key: impl Into<String>) -> Self {
        let sort_key = sort_key.into();
        Self {
            name: format!("{sort_key}LocalIndex"),
            hash_key: primary_hash.into(),
            sort_key,
            kind: IndexKind::Local,
        }
    }

    /// A global index partitioned by `hash_key`, named `{hash_key}GlobalIndex`.
    pub fn global(hash_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        let hash_key = hash_key.into();
        Self {
            name: format!("{hash_key}GlobalIndex"),
            hash_key,
            sort_key: sort_key.into(),
            kind: IndexKind::Global,
        }
    }

    /// Override the generated name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Key metadata of one model: primary key, declared attribute types and
/// secondary indexes.
///
/// Fixed once the model is registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySchema {
    /// Primary partition attribute.
    #[serde(default = "default_hash_key")]
    pub hash_key: String,
    /// Optional primary sort attribute.
    #[serde(default)]
    pub sort_key: Option<String>,
    /// Declared scalar types by attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, ScalarType>,
    /// Secondary indexes in declaration order.
    #[serde(default)]
    pub indexes: Vec<SecondaryIndex>,
}

impl KeySchema {
    /// Create a schema with the given hash attribute.
    pub fn new(hash_key: impl Into<String>, hash_type: ScalarType) -> Self {
        let hash_key = hash_key.into();
        let mut attributes = BTreeMap::new();
        attributes.insert(hash_key.clone(), hash_type);
        Self {
            hash_key,
            sort_key: None,
            attributes,
            indexes: Vec::new(),
        }
    }

    /// Set the primary sort attribute.
    pub fn with_sort_key(mut self, name: impl Into<String>, ty: ScalarType) -> Self {
        let name = name.into();
        self.attributes.insert(name.clone(), ty);
        self.sort_key = Some(name);
        self
    }

    /// Declare a non-key attribute type.
    pub fn with_attribute(mut self, name: impl Into<String>, ty: ScalarType) -> Self {
        self.attributes.insert(name.into(), ty);
        self
    }

    /// Add a local index sorted by `name`.
    pub fn with_local_index(mut self, name: impl Into<String>, ty: ScalarType) -> Self {
        let name = name.into();
        self.attributes.insert(name.clone(), ty);
        let index = SecondaryIndex::local(self.hash_key.clone(), name);
        self.indexes.push(index);
        self
    }

    /// Add a global index partitioned by `hash_key` and sorted by `sort_key`.
    pub fn with_global_index(
        mut self,
        hash_key: impl Into<String>,
        hash_type: ScalarType,
        sort_key: impl Into<String>,
        sort_type: ScalarType,
    ) -> Self {
        let index = SecondaryIndex::global(hash_key, sort_key);
        self.attributes.insert(index.hash_key.clone(), hash_type);
        self.attributes.insert(index.sort_key.clone(), sort_type);
        self.indexes.push(index);
        self
    }

    /// Add a prebuilt index. Its key attributes must be declared separately.
    pub fn with_index(mut self, index: SecondaryIndex) -> Self {
        self.indexes.push(index);
        self
    }

    /// Declared type of an attribute.
    pub fn scalar_type(&self, name: &str) -> Option<ScalarType> {
        self.attributes.get(name).copied()
    }

    /// Declared type of the hash attribute.
    pub fn hash_type(&self) -> Result<ScalarType, Error> {
        self.scalar_type(&self.hash_key).ok_or_else(|| {
            Error::Configuration(format!(
                "hash key `{}` has no declared type",
                self.hash_key
            ))
        })
    }

    /// Look up an index by name.
    pub fn index(&self, name: &str) -> Option<&SecondaryIndex> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Indexes that use `name` as their hash or sort attribute.
    pub fn indexes_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SecondaryIndex> {
        self.indexes
            .iter()
            .filter(move |i| i.hash_key == name || i.sort_key == name)
    }

    /// Whether `name` is a key attribute of the table or any index.
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.hash_key == name
            || self.sort_key.as_deref() == Some(name)
            || self.indexes_for(name).next().is_some()
    }

    /// The default sort order: the sort attribute, else the hash attribute.
    pub fn default_order_key(&self) -> &str {
        self.sort_key.as_deref().unwrap_or(&self.hash_key)
    }

    /// Check that every key attribute has a declared type and indexes are
    /// consistent.
    pub fn validate(&self) -> Result<(), Error> {
        if self.hash_key.is_empty() {
            return Err(Error::Configuration("hash key name is empty".into()));
        }
        self.hash_type()?;

        if let Some(sort) = &self.sort_key {
            if sort == &self.hash_key {
                return Err(Error::Configuration(format!(
                    "sort key `{sort}` is also the hash key"
                )));
            }
            self.require_type(sort, "sort key")?;
        }

        let mut names = HashSet::new();
        for index in &self.indexes {
            if !names.insert(index.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "duplicate index name `{}`",
                    index.name
                )));
            }
            if index.kind == IndexKind::Local && index.hash_key != self.hash_key {
                return Err(Error::Configuration(format!(
                    "local index `{}` must use the table hash key `{}`",
                    index.name, self.hash_key
                )));
            }
            self.require_type(&index.hash_key, &index.name)?;
            self.require_type(&index.sort_key, &index.name)?;
        }
        Ok(())
    }

    fn require_type(&self, attribute: &str, owner: &str) -> Result<(), Error> {
        if self.attributes.contains_key(attribute) {
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "key attribute `{attribute}` of {owner} has no declared type"
            )))
        }
    }
}
