//! CLI error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the `dynorm` binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {what}: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid data file: {0}")]
    Data(String),

    #[error(transparent)]
    Filter(#[from] dynorm_proto::Error),

    #[error(transparent)]
    Core(#[from] dynorm_core::Error),

    #[error(transparent)]
    Store(#[from] dynorm_core::StoreError),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
