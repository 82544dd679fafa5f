//! Core error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by planning and executing reads.
///
/// Finding no records is not an error: reads return an empty result.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed filter, operand or pagination directive.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Model or key schema is missing or inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The store collaborator failed; the error is passed through unchanged.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// The store reported a timeout while fetching a page.
    #[error("store read timed out after {pages} page(s)")]
    Timeout { pages: usize },

    /// The read deadline elapsed between pages.
    #[error("read deadline exceeded after {pages} page(s)")]
    DeadlineExceeded { pages: usize },

    /// The caller cancelled the read between pages.
    #[error("read cancelled after {pages} page(s)")]
    Cancelled { pages: usize },

    /// The store's paging protocol did not make progress.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<dynorm_proto::Error> for Error {
    fn from(err: dynorm_proto::Error) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}
