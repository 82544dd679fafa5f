//! Core type definitions for the catalog.

use serde::{Deserialize, Serialize};

/// Scalar types an attribute can be declared with.
///
/// Declared types drive coercion of filter operands and returned records,
/// and the comparison used when sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// UTF-8 string.
    String,
    /// Integer or floating point number.
    Number,
    /// Point in time, stored as epoch milliseconds.
    Date,
    /// Boolean value.
    Boolean,
}

impl ScalarType {
    /// Get the type name.
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Date => "date",
            ScalarType::Boolean => "boolean",
        }
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
