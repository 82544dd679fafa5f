//! Store-access collaborator interface.
//!
//! The planner never talks to a concrete store. It issues two kinds of
//! request through [`StoreClient`]: a targeted read against the table or a
//! secondary index with a key condition, and a full-table scan. Both return one
//! [`Page`] at a time together with an optional continuation [`Cursor`].
//!
//! [`MemoryStore`] is an in-process implementation that evaluates the native
//! expression grammar, used by tests, benches and the CLI.

pub mod expression;
mod memory;

use std::collections::BTreeMap;
use std::fmt;

use dynorm_proto::{Item, Value};
use thiserror::Error;

pub use memory::{MemoryStore, DEFAULT_PAGE_SIZE};

/// Errors reported by a store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the request (bad expression, unknown table or index).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The page fetch timed out.
    #[error("page fetch timed out")]
    Timeout,

    /// Any other collaborator failure.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Opaque continuation token returned with a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(Vec<u8>);

impl Cursor {
    /// Wrap raw cursor bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw cursor bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// One page of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records in store order.
    pub items: Vec<Item>,
    /// Present when more pages remain.
    pub cursor: Option<Cursor>,
}

impl Page {
    /// A page with no continuation.
    pub fn last(items: Vec<Item>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }

    /// A page followed by more results.
    pub fn with_cursor(items: Vec<Item>, cursor: Cursor) -> Self {
        Self {
            items,
            cursor: Some(cursor),
        }
    }
}

/// Name placeholder table: alias (`#X`) to attribute name.
pub type NameMap = BTreeMap<String, String>;

/// Value placeholder table: placeholder (`:x`) to bound value.
pub type ValueMap = BTreeMap<String, Value>;

/// A key-condition read against the table or one of its indexes.
#[derive(Debug, Clone, Copy)]
pub struct TargetedRead<'a> {
    /// Table name.
    pub table: &'a str,
    /// Secondary index name; `None` reads the table's primary key.
    pub index: Option<&'a str>,
    /// Key condition expression.
    pub key_condition: &'a str,
    /// Filter expression applied to records matching the key condition.
    pub filter: Option<&'a str>,
    /// Name placeholders used by both expressions.
    pub names: &'a NameMap,
    /// Value placeholders used by both expressions.
    pub values: &'a ValueMap,
    /// Continuation from the previous page.
    pub cursor: Option<&'a Cursor>,
}

/// A full-table scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanRequest<'a> {
    /// Table name.
    pub table: &'a str,
    /// Filter expression; `None` returns every record.
    pub filter: Option<&'a str>,
    /// Name placeholders used by the filter.
    pub names: &'a NameMap,
    /// Value placeholders used by the filter.
    pub values: &'a ValueMap,
    /// Continuation from the previous page.
    pub cursor: Option<&'a Cursor>,
}

/// A partitioned key-value store.
///
/// Implementations perform one blocking page fetch per call. "No records" is an
/// empty page, never an error.
pub trait StoreClient {
    /// Read records matching a key condition.
    fn targeted_read(&self, request: &TargetedRead<'_>) -> Result<Page, StoreError>;

    /// Scan the whole table.
    fn full_scan(&self, request: &ScanRequest<'_>) -> Result<Page, StoreError>;
}

impl<S: StoreClient + ?Sized> StoreClient for &S {
    fn targeted_read(&self, request: &TargetedRead<'_>) -> Result<Page, StoreError> {
        (**self).targeted_read(request)
    }

    fn full_scan(&self, request: &ScanRequest<'_>) -> Result<Page, StoreError> {
        (**self).full_scan(request)
    }
}

impl<S: StoreClient + ?Sized> StoreClient for std::sync::Arc<S> {
    fn targeted_read(&self, request: &TargetedRead<'_>) -> Result<Page, StoreError> {
        (**self).targeted_read(request)
    }

    fn full_scan(&self, request: &ScanRequest<'_>) -> Result<Page, StoreError> {
        (**self).full_scan(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_display_is_hex() {
        let cursor = Cursor::new(vec![0x00, 0x2a, 0xff]);
        assert_eq!(cursor.to_string(), "002aff");
        assert_eq!(cursor.as_bytes(), &[0x00, 0x2a, 0xff]);
    }

    #[test]
    fn test_page_constructors() {
        assert!(Page::last(vec![]).cursor.is_none());
        let page = Page::with_cursor(vec![Item::new()], Cursor::new(vec![1]));
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.cursor, Some(Cursor::new(vec![1])));
    }

    #[test]
    fn test_other_error_passthrough() {
        let err = StoreError::from(Box::<dyn std::error::Error + Send + Sync>::from(
            "throttled",
        ));
        assert_eq!(err.to_string(), "throttled");
    }
}
