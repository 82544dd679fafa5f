//! Key-path classification.
//!
//! Tags every attribute of a where clause with its key role and decides
//! whether the clause pins a single partition (primary hash equality), which
//! makes a targeted read possible instead of a scan.

use dynorm_proto::{Clause, Condition, WhereClause};

use super::planner::ReadMode;
use crate::catalog::KeySchema;

/// Role an attribute plays in the model's key layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRole {
    /// Partition attribute of the table.
    PrimaryHash,
    /// Sort attribute of the table.
    PrimarySort,
    /// Partition attribute of the named secondary index.
    IndexHash(String),
    /// Sort attribute of the named secondary index.
    IndexSort(String),
    /// Not part of any key.
    NonKey,
}

impl KeyRole {
    /// Whether the attribute is part of any key.
    pub fn is_key(&self) -> bool {
        !matches!(self, KeyRole::NonKey)
    }
}

/// The attribute chosen as the second key condition of a targeted read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKeyMatch {
    /// Sort attribute name.
    pub attribute: String,
    /// Secondary index owning the sort attribute; `None` for the table itself.
    pub index: Option<String>,
}

/// Result of classifying a where clause against a key schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Role of every attribute, in clause order.
    pub roles: Vec<(String, KeyRole)>,
    /// The primary hash attribute has a plain equality condition.
    pub has_primary_hash_equality: bool,
    /// The primary hash attribute has a membership list, which rules out a
    /// targeted read.
    pub hash_is_list: bool,
    /// Sort attribute usable as a key condition, when a targeted read is possible.
    pub sort_key: Option<SortKeyMatch>,
}

impl Classification {
    /// Role of an attribute, if it appears in the clause.
    pub fn role(&self, name: &str) -> Option<&KeyRole> {
        self.roles.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Secondary index a targeted read should use; `None` is the table.
    pub fn target_index(&self) -> Option<&str> {
        self.sort_key.as_ref().and_then(|m| m.index.as_deref())
    }

    /// Read mode implied by the clause.
    pub fn mode(&self) -> ReadMode {
        if self.has_primary_hash_equality {
            ReadMode::Lookup
        } else {
            ReadMode::Scan
        }
    }
}

/// Role of a single attribute.
///
/// Table keys take precedence over index keys; among indexes the first
/// declared wins.
pub fn role_of(schema: &KeySchema, name: &str) -> KeyRole {
    if schema.hash_key == name {
        return KeyRole::PrimaryHash;
    }
    if schema.sort_key.as_deref() == Some(name) {
        return KeyRole::PrimarySort;
    }
    for index in &schema.indexes {
        if index.hash_key == name {
            return KeyRole::IndexHash(index.name.clone());
        }
        if index.sort_key == name {
            return KeyRole::IndexSort(index.name.clone());
        }
    }
    KeyRole::NonKey
}

/// Classify a where clause.
pub fn classify(schema: &KeySchema, clause: &WhereClause) -> Classification {
    let mut roles: Vec<(String, KeyRole)> = Vec::new();
    let mut note = |name: &str| {
        if !roles.iter().any(|(n, _)| n == name) {
            roles.push((name.to_string(), role_of(schema, name)));
        }
    };
    for entry in clause.clauses() {
        match entry {
            Clause::Attribute { name, .. } => note(name),
            Clause::AnyOf(entries) => entries.iter().for_each(|(name, _)| note(name)),
        }
    }

    let hash_condition = clause.get(&schema.hash_key);
    let has_primary_hash_equality = matches!(hash_condition, Some(Condition::Equals(_)));
    let hash_is_list = matches!(hash_condition, Some(Condition::In(_)));

    let sort_key = if has_primary_hash_equality {
        find_sort_key(schema, clause)
    } else {
        None
    };

    Classification {
        roles,
        has_primary_hash_equality,
        hash_is_list,
        sort_key,
    }
}

/// The table's own sort attribute wins; otherwise the first clause attribute
/// that sorts an index sharing the table's hash attribute. Membership lists
/// are never key conditions.
fn find_sort_key(schema: &KeySchema, clause: &WhereClause) -> Option<SortKeyMatch> {
    if let Some(sort) = &schema.sort_key {
        if clause.get(sort).is_some_and(|c| !c.is_membership()) {
            return Some(SortKeyMatch {
                attribute: sort.clone(),
                index: None,
            });
        }
    }

    clause
        .attributes()
        .filter(|(name, condition)| *name != schema.hash_key && !condition.is_membership())
        .find_map(|(name, _)| {
            schema
                .indexes
                .iter()
                .find(|index| index.sort_key == name && index.hash_key == schema.hash_key)
                .map(|index| SortKeyMatch {
                    attribute: name.to_string(),
                    index: Some(index.name.clone()),
                })
        })
}
