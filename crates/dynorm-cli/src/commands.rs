//! Subcommand arguments and handlers.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use dynorm_core::config::{DEFAULT_MAX_PAGES, DEFAULT_READ_TIMEOUT};
use dynorm_core::store::DEFAULT_PAGE_SIZE;
use dynorm_core::{ExecutorConfig, ExplainService, QueryExecutor, ReadContext};
use dynorm_proto::ReadFilter;
use tracing::info;

use crate::error::{CliError, Result};
use crate::formatter::{format_explain, format_outcome, OutputFormat};
use crate::loader::{load_registry, load_store};

/// Arguments shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Schema file listing models and their key schemas
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Model to read
    #[arg(short, long)]
    pub model: String,

    /// ORM filter as JSON: {where, order, offset|skip, limit, include}
    #[arg(short, long, default_value = "{}")]
    pub filter: String,
}

impl ReadArgs {
    fn read_filter(&self) -> Result<ReadFilter> {
        let json: serde_json::Value =
            serde_json::from_str(&self.filter).map_err(|source| CliError::Json {
                what: "--filter".into(),
                source,
            })?;
        Ok(ReadFilter::from_json(&json)?)
    }
}

/// Arguments of `dynorm explain`.
#[derive(Args, Debug, Clone)]
pub struct ExplainArgs {
    #[command(flatten)]
    pub read: ReadArgs,
}

/// Arguments of `dynorm query`.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub read: ReadArgs,

    /// Data file mapping model names to record arrays
    #[arg(short, long)]
    pub data: PathBuf,

    /// Records examined per store page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Read deadline in milliseconds; 0 disables it
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT.as_millis() as u64)]
    pub timeout_ms: u64,

    /// Maximum pages per read
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: usize,
}

impl QueryArgs {
    /// Build the executor configuration.
    pub fn executor_config(&self) -> ExecutorConfig {
        let config = ExecutorConfig::new().with_max_pages(self.max_pages);
        if self.timeout_ms == 0 {
            config.without_read_timeout()
        } else {
            config.with_read_timeout(Duration::from_millis(self.timeout_ms))
        }
    }
}

/// Plan a read and describe it without touching any data.
pub fn run_explain(args: &ExplainArgs, format: OutputFormat) -> Result<String> {
    let registry = load_registry(&args.read.schema)?;
    let filter = args.read.read_filter()?;
    let result = ExplainService::new(&registry).explain(&args.read.model, &filter)?;
    Ok(format_explain(&result, format))
}

/// Run a read against a dataset loaded into the in-memory store.
pub fn run_query(args: &QueryArgs, format: OutputFormat) -> Result<String> {
    let registry = load_registry(&args.read.schema)?;
    let store = load_store(&registry, &args.data, args.page_size)?;
    let filter = args.read.read_filter()?;

    let executor = QueryExecutor::new(&store, &registry).with_config(args.executor_config());
    let outcome = executor.read(&args.read.model, &filter, &ReadContext::new())?;
    info!(
        model = %args.read.model,
        mode = ?outcome.mode,
        pages = outcome.pages,
        records = outcome.items.len(),
        "query complete"
    );
    Ok(format_outcome(&outcome, format))
}
