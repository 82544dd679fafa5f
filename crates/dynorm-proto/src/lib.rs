//! Filter and read-request types for dynorm.
//!
//! This crate defines the typed intermediate representation of ORM-style read
//! requests, and the parsing of their loosely-typed JSON form.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for filter operands and records
//! - [`filter`] - Where clause IR: conditions and `or` groups
//! - [`request`] - Read requests: ordering, offset/limit, include
//! - [`json`] - Conversions between JSON documents and values
//! - [`error`] - Parsing error types
//!
//! # Example
//!
//! ```
//! use dynorm_proto::{Condition, ReadFilter};
//! use serde_json::json;
//!
//! let filter = ReadFilter::from_json(&json!({
//!     "where": {"realm": "beatles", "order": {"gt": 2}},
//!     "order": "order DESC",
//!     "limit": 2
//! }))
//! .unwrap();
//!
//! assert_eq!(filter.where_clause.get("order"), Some(&Condition::gt(2)));
//! assert_eq!(filter.limit, Some(2));
//! ```

pub mod error;
pub mod filter;
pub mod json;
pub mod request;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use filter::{Clause, CompareOp, Condition, WhereClause};
pub use json::{item_from_json, item_to_json, json_to_value, value_to_json};
pub use request::{OrderDirection, OrderSpec, ReadFilter};
pub use value::{Item, Value};
