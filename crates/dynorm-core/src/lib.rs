//! dynorm core: compiles ORM read filters into partitioned key-value store
//! requests and executes them.
//!
//! Models are registered in a [`ModelRegistry`] with their key schema. A read
//! is planned as a targeted read of one partition when the where clause pins
//! the hash attribute with an equality, and as a filtered scan otherwise. The
//! executor follows store cursors to exhaustion, then sorts, offsets and
//! limits the result in memory.
//!
//! ```
//! use dynorm_core::{
//!     KeySchema, MemoryStore, ModelDef, ModelRegistry, QueryExecutor, ScalarType,
//! };
//! use dynorm_core::proto::{Item, ReadFilter, Value};
//!
//! let schema = KeySchema::new("realm", ScalarType::String).with_sort_key("id", ScalarType::String);
//! let registry = ModelRegistry::new();
//! registry.register(ModelDef::new("Beatle", schema.clone())).unwrap();
//!
//! let store = MemoryStore::new();
//! store.create_table("Beatle", schema);
//! let mut item = Item::new();
//! item.insert("realm".into(), Value::from("beatles"));
//! item.insert("id".into(), Value::from("1"));
//! store.put("Beatle", item).unwrap();
//!
//! let executor = QueryExecutor::new(&store, &registry);
//! let items = executor.find("Beatle", &ReadFilter::new()).unwrap();
//! assert_eq!(items.len(), 1);
//! ```

pub mod catalog;
pub mod coerce;
pub mod config;
pub mod error;
pub mod query;
pub mod store;

pub use catalog::{IndexKind, KeySchema, ModelDef, ModelRegistry, ScalarType, SecondaryIndex};
pub use config::ExecutorConfig;
pub use error::Error;
pub use query::{
    CancellationToken, ExplainResult, ExplainService, QueryExecutor, QueryPlan, QueryPlanner,
    ReadContext, ReadMode, ReadOutcome,
};
pub use store::{Cursor, MemoryStore, Page, ScanRequest, StoreClient, StoreError, TargetedRead};

/// Re-export protocol types.
pub use dynorm_proto as proto;
