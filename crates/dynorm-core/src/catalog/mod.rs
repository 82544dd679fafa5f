//! Model catalog.
//!
//! The catalog holds key metadata for every model: primary hash and sort
//! attributes, declared scalar types, and secondary indexes.

mod registry;
mod schema;
mod types;

pub use registry::{ModelDef, ModelRegistry};
pub use schema::{IndexKind, KeySchema, SecondaryIndex, DEFAULT_HASH_KEY};
pub use types::ScalarType;
