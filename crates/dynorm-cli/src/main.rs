//! dynorm command-line tool.
//!
//! Plans ORM filters against a model schema and runs them over a JSON
//! dataset loaded into the in-memory store.

mod commands;
mod error;
mod formatter;
mod loader;

use clap::{Parser, Subcommand};
use commands::{ExplainArgs, QueryArgs};
use formatter::OutputFormat;

/// dynorm command-line tool
#[derive(Parser, Debug)]
#[command(name = "dynorm")]
#[command(version, about = "Plan and run ORM filters against a partitioned key-value model")]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "json", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the store request a filter compiles to
    Explain(ExplainArgs),
    /// Run a filter over a dataset
    Query(QueryArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dynorm=info,dynorm_core=info,dynorm_cli=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Explain(args) => commands::run_explain(args, cli.format),
        Command::Query(args) => commands::run_query(args, cli.format),
    };

    match result {
        Ok(output) => println!("{output}"),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_defaults() {
        let cli = Cli::parse_from([
            "dynorm", "query", "-s", "schema.json", "-m", "Beatle", "-d", "data.json",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        let Command::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.read.filter, "{}");
        assert_eq!(args.page_size, dynorm_core::store::DEFAULT_PAGE_SIZE);
        assert_eq!(args.timeout_ms, 30_000);
    }

    #[test]
    fn test_parse_explain_with_format() {
        let cli = Cli::parse_from([
            "dynorm", "explain", "--schema", "s.json", "--model", "Beatle",
            "--filter", r#"{"where": {"realm": "x"}}"#, "--format", "lines",
        ]);
        assert_eq!(cli.format, OutputFormat::Lines);
        assert!(matches!(cli.command, Command::Explain(_)));
    }
}
