//! Removal by exact key.

use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::trace;

use super::codec::Statement;
use super::schema::Schema;
use crate::error::Result;

/// Deletes `key` if present. Missing and expired keys are not an error.
pub(crate) fn delete(conn: &Connection, schema: &Schema, key: &str) -> Result<()> {
    let stmt = Statement::new(format!("DELETE FROM {} WHERE key = :key", schema.table()))
        .bind(":key", Value::Text(key.to_string()));

    let removed = conn
        .prepare_cached(&stmt.sql)?
        .execute(stmt.named().as_slice())?;

    trace!(key = %key, removed, "Delete applied");
    Ok(())
}
