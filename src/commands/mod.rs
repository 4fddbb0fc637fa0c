//! CLI command implementations for sqlkv.
//!
//! Every command opens the store, runs one operation and closes it again.
//! Records are printed to stdout as one JSON object per line. Values that
//! are not valid UTF-8 are printed as `value_hex` instead of `value`.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlkv::{KvStore, ReadOptions, Record, SqlStore, StoreConfig};
use std::io::Write as _;
use std::time::Duration;

use crate::Commands;

/// JSON line printed for each record.
#[derive(Debug, Serialize)]
struct RecordLine<'a> {
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_ms: Option<u64>,
}

impl<'a> From<&'a Record> for RecordLine<'a> {
    fn from(record: &'a Record) -> Self {
        let (value, value_hex) = match std::str::from_utf8(&record.value) {
            Ok(text) => (Some(text), None),
            Err(_) => (None, Some(hex::encode(&record.value))),
        };
        Self {
            key: &record.key,
            value,
            value_hex,
            expires_at: record.expires_at.map(|at| at.to_rfc3339()),
            ttl_ms: record
                .ttl()
                .map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}

pub async fn execute(config: StoreConfig, command: Commands) -> Result<()> {
    let store = match command {
        // `init` must not depend on an initialized store.
        Commands::Init => SqlStore::connect(config)?,
        _ => SqlStore::open(config)
            .await
            .context("Failed to open store")?,
    };

    let result = run(&store, command).await;
    store.close();
    result
}

async fn run(store: &SqlStore, command: Commands) -> Result<()> {
    match command {
        Commands::Init => {
            store.init().await?;
            eprintln!(
                "Initialized table '{}' on {}",
                store.table(),
                store.endpoint()
            );
        },
        Commands::Write {
            key,
            value,
            hex,
            ttl_secs,
        } => {
            let bytes = if hex {
                hex::decode(&value).context("value is not valid hex")?
            } else {
                value.into_bytes()
            };
            store
                .write(&key, &bytes, Duration::from_secs(ttl_secs))
                .await?;
        },
        Commands::Read {
            key,
            prefix,
            limit,
            offset,
        } => {
            let options = if prefix {
                ReadOptions::prefix().limit(limit).offset(offset)
            } else {
                ReadOptions::exact()
            };
            let records = store.read(&key, options).await?;
            print_records(&records)?;
        },
        Commands::Delete { key } => {
            store.delete(&key).await?;
        },
        Commands::List { keys_only } => {
            if keys_only {
                let mut out = std::io::stdout().lock();
                for key in store.list_keys().await? {
                    writeln!(out, "{key}")?;
                }
            } else {
                print_records(&store.list().await?)?;
            }
        },
        Commands::Purge => {
            let removed = store.purge_expired().await?;
            eprintln!("Removed {removed} expired record(s)");
        },
    }
    Ok(())
}

fn print_records(records: &[Record]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for record in records {
        serde_json::to_writer(&mut out, &RecordLine::from(record))?;
        writeln!(out)?;
    }
    Ok(())
}
