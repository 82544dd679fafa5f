//! Filter parsing error types.

use thiserror::Error;

/// Errors raised while turning a loosely-typed ORM filter into typed IR.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The filter or one of its conditions has the wrong shape.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// An operator object used a symbol outside the supported table.
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    /// A boolean combinator that has no translation.
    #[error("unsupported combinator `{0}`")]
    UnsupportedCombinator(String),

    /// `limit`, `offset` or `skip` was not a non-negative integer.
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),

    /// `order` was not a field list.
    #[error("invalid order: {0}")]
    InvalidOrder(String),
}
