//! sqlkv - durable key-value store with TTL and prefix reads over SQLite.
//!
//! The binary is a thin operator tool around the library:
//!
//! - Preparing a keyspace (`sqlkv init`)
//! - Writing, reading and deleting records (`sqlkv write|read|delete`)
//! - Listing live records (`sqlkv list`)
//! - Reclaiming expired rows (`sqlkv purge`)
//!
//! See `sqlkv --help` for full usage information.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlkv::StoreConfig;
use sqlkv::logging::{LogFormat, init_logging};
use std::path::PathBuf;

mod commands;

const AFTER_HELP: &str = "\
EXAMPLES:
  sqlkv -d sessions -n ./kv.db init             Create the sessions table
  sqlkv -d sessions -n ./kv.db write s:1 alice --ttl-secs 60
  sqlkv -d sessions -n ./kv.db read s: --prefix --limit 10
  sqlkv -c sqlkv.toml list --keys-only
  sqlkv -c sqlkv.toml purge                     Remove expired rows now";

#[derive(Parser)]
#[command(name = "sqlkv")]
#[command(version)]
#[command(about = "Durable key-value store with TTL and prefix reads over SQLite")]
#[command(after_help = AFTER_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML store configuration
    #[arg(short, long, global = true, conflicts_with_all = ["database", "nodes"])]
    config: Option<PathBuf>,

    /// Database identifier (also the default table name)
    #[arg(short, long, global = true)]
    database: Option<String>,

    /// Endpoint to try, in order. Repeatable. Defaults to an in-memory database.
    #[arg(short = 'n', long = "node", global = true)]
    nodes: Vec<String>,

    /// Per-operation deadline in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the backing table and index if missing
    Init,
    /// Insert or replace a record
    ///
    /// Examples:
    ///   sqlkv write user:1 alice             # Never expires
    ///   sqlkv write token abc --ttl-secs 30  # Expires in 30s
    Write {
        key: String,
        value: String,
        /// Decode the value from hex instead of taking it as UTF-8 text
        #[arg(long)]
        hex: bool,
        /// Time to live in seconds (0 = never expires)
        #[arg(long, default_value = "0")]
        ttl_secs: u64,
    },
    /// Read one record, or every record sharing a prefix
    Read {
        key: String,
        /// Treat the key as a prefix
        #[arg(short, long)]
        prefix: bool,
        /// Maximum records in prefix mode (0 = unbounded)
        #[arg(short, long, default_value = "0")]
        limit: usize,
        /// Records to skip in prefix mode
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Delete a record (missing keys are not an error)
    Delete { key: String },
    /// List every live record
    List {
        /// Print keys only
        #[arg(long)]
        keys_only: bool,
    },
    /// Physically remove expired rows now
    Purge,
}

impl Cli {
    fn store_config(&self) -> Result<StoreConfig> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::load_from(path)?,
            None => {
                let database = self
                    .database
                    .clone()
                    .context("--database is required without --config")?;
                let mut config = StoreConfig::new(database);
                if self.nodes.is_empty() {
                    config = config.with_node(sqlkv::constants::MEMORY_NODE);
                }
                for node in &self.nodes {
                    config = config.with_node(node.clone());
                }
                config
            },
        };

        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = ms;
        }
        // One-shot commands never run long enough to need it.
        config.reclaim_interval_ms = None;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    init_logging(cli.log_format, level);

    let config = cli.store_config()?;
    commands::execute(config, cli.command).await
}
