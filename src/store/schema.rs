//! Idempotent schema setup.
//!
//! One table per keyspace, clustered on `key` for ordered prefix scans, plus
//! a partial index on `expires_at` for reclamation.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Error, Result};

const REQUIRED_COLUMNS: [&str; 3] = ["key", "value", "expires_at"];

/// Table layout for one keyspace.
#[derive(Debug, Clone)]
pub(crate) struct Schema {
    name: String,
    table: String,
    expiry_index: String,
}

impl Schema {
    /// Builds the schema for a table name already checked by
    /// [`crate::StoreConfig::validate`]. The name is used verbatim.
    pub fn new(name: &str) -> Self {
        let name = name.to_string();
        Self {
            table: quote_identifier(&name),
            expiry_index: quote_identifier(&format!("{name}_expires_at_idx")),
            name,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Quoted table identifier for use in SQL.
    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                key TEXT NOT NULL PRIMARY KEY CHECK (length(key) > 0),
                value BLOB NOT NULL,
                expires_at INTEGER
            ) WITHOUT ROWID",
            self.table,
        )
    }

    fn create_index_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}(expires_at) WHERE expires_at IS NOT NULL",
            self.expiry_index, self.table,
        )
    }

    /// Creates the table and index if missing, then checks the columns.
    ///
    /// Safe to call on every start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Initialization`] if the DDL fails or an existing
    /// table lacks the expected columns or a unique `key`.
    pub fn ensure(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn
            .transaction()
            .map_err(|e| Error::Initialization(format!("failed to begin transaction: {e}")))?;

        tx.execute_batch(&self.create_table_sql()).map_err(|e| {
            Error::Initialization(format!("failed to create table {}: {e}", self.name))
        })?;

        let columns = table_columns(&tx, &self.name)
            .map_err(|e| Error::Initialization(format!("failed to inspect {}: {e}", self.name)))?;
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|required| !columns.iter().any(|c| c == *required))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Initialization(format!(
                "table {} exists without column(s): {}",
                self.name,
                missing.join(", ")
            )));
        }

        let unique = key_is_unique(&tx, &self.name)
            .map_err(|e| Error::Initialization(format!("failed to inspect {}: {e}", self.name)))?;
        if !unique {
            return Err(Error::Initialization(format!(
                "table {} exists but its key column is neither the sole primary key nor uniquely indexed",
                self.name
            )));
        }

        tx.execute_batch(&self.create_index_sql()).map_err(|e| {
            Error::Initialization(format!("failed to create index on {}: {e}", self.name))
        })?;

        tx.commit()
            .map_err(|e| Error::Initialization(format!("failed to commit schema: {e}")))?;

        debug!(table = %self.name, "Schema ready");
        Ok(())
    }
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map([table], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>();
    columns
}

/// Upserts target `ON CONFLICT(key)`, which needs `key` to be the whole
/// primary key or covered on its own by a unique index.
fn key_is_unique(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let sole_primary_key: i64 = conn.query_row(
        "SELECT coalesce(sum(name = 'key' AND pk = 1), 0) = 1 AND coalesce(max(pk), 0) = 1
         FROM pragma_table_info(?1)",
        [table],
        |row| row.get(0),
    )?;
    if sole_primary_key == 1 {
        return Ok(true);
    }

    let unique_indexes: i64 = conn.query_row(
        "SELECT count(*) FROM pragma_index_list(?1) AS il
         WHERE il.\"unique\" = 1 AND il.partial = 0
           AND (SELECT group_concat(ii.name) FROM pragma_index_info(il.name) AS ii) = 'key'",
        [table],
        |row| row.get(0),
    )?;
    Ok(unique_indexes > 0)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        let schema = Schema::new("cache");
        schema.ensure(&mut conn).unwrap();
        schema.ensure(&mut conn).unwrap();

        let indexes: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
                ["cache_expires_at_idx"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 1);
    }

    #[test]
    fn test_empty_key_violates_check() {
        let mut conn = Connection::open_in_memory().unwrap();
        let schema = Schema::new("cache");
        schema.ensure(&mut conn).unwrap();

        let err = conn
            .execute(
                &format!("INSERT INTO {} (key, value) VALUES ('', x'')", schema.table()),
                [],
            )
            .unwrap_err();
        assert_eq!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );
    }

    #[test]
    fn test_incompatible_table_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE legacy (id INTEGER PRIMARY KEY, body TEXT)")
            .unwrap();

        let err = Schema::new("legacy").ensure(&mut conn).unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
        assert!(err.to_string().contains("key"));
    }

    #[test]
    fn test_table_name_used_verbatim() {
        let schema = Schema::new("cache_v2");
        assert_eq!(schema.name(), "cache_v2");
        assert_eq!(schema.table(), "\"cache_v2\"");
    }

    #[test]
    fn test_non_unique_key_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE loose (key TEXT, value BLOB, expires_at INTEGER)")
            .unwrap();

        let err = Schema::new("loose").ensure(&mut conn).unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
        assert!(err.to_string().contains("key column"));
    }

    #[test]
    fn test_composite_primary_key_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE wide (key TEXT, value BLOB, expires_at INTEGER, shard INTEGER,
             PRIMARY KEY (shard, key))",
        )
        .unwrap();

        let err = Schema::new("wide").ensure(&mut conn).unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
    }

    #[test]
    fn test_partial_unique_index_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE scoped (key TEXT, value BLOB, expires_at INTEGER);
             CREATE UNIQUE INDEX scoped_key ON scoped(key) WHERE expires_at IS NULL;",
        )
        .unwrap();

        let err = Schema::new("scoped").ensure(&mut conn).unwrap_err();
        assert!(matches!(err, Error::Initialization(_)));
    }

    #[test]
    fn test_unique_index_on_key_accepted() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE indexed (key TEXT NOT NULL, value BLOB NOT NULL, expires_at INTEGER);
             CREATE UNIQUE INDEX indexed_key ON indexed(key);",
        )
        .unwrap();

        let schema = Schema::new("indexed");
        schema.ensure(&mut conn).unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {t} (key, value) VALUES ('k', x'01')
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                t = schema.table()
            ),
            [],
        )
        .unwrap();
    }
}
