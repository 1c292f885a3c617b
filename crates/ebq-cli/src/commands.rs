use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// The `load | query | mk | update | show | version` dispatch contract of
/// the external table service CLI. Everything past `--master_key_filename`
/// and a command's own flags is opaque and handed straight to the
/// `TableService` implementor the embedding host supplies.
#[derive(Debug, Parser)]
#[command(name = "ebq")]
#[command(about = "Client-side rewriter/crypto engine for querying encrypted columns", long_about = None, version = env!("CARGO_PKG_VERSION"))]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
    /// Path to the master key file; created if absent.
    #[arg(long = "master_key_filename")]
    pub master_key_filename: PathBuf,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    #[command(about = "Encrypt and load rows into a table")]
    Load(LoadArgs),
    #[command(about = "Rewrite and run a query against a table")]
    Query(QueryArgs),
    #[command(name = "mk", about = "Create a table from an extended schema")]
    Mk(MkArgs),
    #[command(about = "Update a table's stored description")]
    Update(UpdateArgs),
    #[command(about = "Show a table's extended schema")]
    Show(ShowArgs),
    #[command(about = "Print the engine version")]
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum LoadFormat {
    Json,
    Csv,
}

#[derive(Debug, Parser)]
pub(crate) struct LoadArgs {
    /// Table to load into.
    pub table: String,
    /// Path to the extended schema JSON.
    pub schema: PathBuf,
    /// Path to the data file: newline-delimited JSON objects, or CSV rows.
    pub rows: PathBuf,
    /// Whether `rows` holds newline-delimited JSON or CSV.
    #[arg(long, value_enum, default_value_t = LoadFormat::Json)]
    pub format: LoadFormat,
    /// CSV only: leading rows to pass through unencrypted instead of encoding.
    #[arg(long, default_value_t = 0)]
    pub skip_leading_rows: usize,
    /// CSV only: must stay `true`; ebq cannot be configured to disallow
    /// quoted newlines inside a cell.
    #[arg(long, default_value_t = true)]
    pub allow_quoted_newlines: bool,
}

#[derive(Debug, Parser)]
pub(crate) struct QueryArgs {
    /// Table the query runs against.
    pub table: String,
    /// SQL text in the supported dialect.
    pub sql: String,
}

#[derive(Debug, Parser)]
pub(crate) struct MkArgs {
    pub table: String,
    /// Path to the extended schema JSON.
    pub schema: PathBuf,
    /// Free-text description to embed alongside the generated metadata.
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Debug, Parser)]
pub(crate) struct UpdateArgs {
    pub table: String,
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Debug, Parser)]
pub(crate) struct ShowArgs {
    pub table: String,
}
