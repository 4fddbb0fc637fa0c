//! Upsert of a single record.

use rusqlite::Connection;
use rusqlite::types::Value;
use std::time::Duration;

use super::codec::{RecordCodec, Statement};
use super::schema::Schema;
use crate::error::{Error, Result};

/// Inserts or fully replaces `key` in one statement.
///
/// Value and expiry are both overwritten; nothing from a previous record
/// for the same key survives. Concurrent upserts are serialized by the
/// engine, so the final row equals exactly one of the inputs.
pub(crate) fn upsert(
    conn: &Connection,
    schema: &Schema,
    codec: &RecordCodec,
    key: &str,
    value: Vec<u8>,
    ttl: Duration,
) -> Result<()> {
    let stmt = Statement::new(format!(
        "INSERT INTO {table} (key, value, expires_at) VALUES (:key, :value, {expires_at})
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        table = schema.table(),
        expires_at = codec.expires_at_sql(),
    ))
    .bind(":key", Value::Text(key.to_string()))
    .bind(":value", Value::Blob(value))
    .bind(":ttl_ms", RecordCodec::ttl_param(ttl));
    let stmt = codec.bind_clock(stmt);

    conn.prepare_cached(&stmt.sql)
        .and_then(|mut prepared| prepared.execute(stmt.named().as_slice()))
        .map_err(|source| Error::write(key, source))?;

    Ok(())
}
