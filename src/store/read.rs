//! Exact and prefix lookups.
//!
//! Both paths apply the codec's live predicate, so rows past their expiry
//! are invisible whether or not reclamation has removed them yet.

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};
use std::fmt::Write as _;

use super::codec::{RecordCodec, Statement};
use super::schema::Schema;
use super::types::Record;
use crate::error::{Error, Result};

/// Returns the live record stored under `key`.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the key is absent or expired.
pub(crate) fn read_exact(
    conn: &Connection,
    schema: &Schema,
    codec: &RecordCodec,
    key: &str,
) -> Result<Record> {
    let stmt = Statement::new(format!(
        "SELECT key, value, expires_at FROM {} WHERE key = :key AND {}",
        schema.table(),
        codec.live_predicate(),
    ))
    .bind(":key", Value::Text(key.to_string()));
    let stmt = codec.bind_clock(stmt);

    let mut prepared = conn.prepare_cached(&stmt.sql)?;
    let record = prepared
        .query_row(stmt.named().as_slice(), RecordCodec::decode)
        .optional()?;

    record.ok_or_else(|| Error::not_found(key))
}

/// Returns live records whose key starts with `prefix`, ascending by key.
///
/// `offset` rows are skipped after ordering; `limit` of 0 means unbounded.
/// An empty prefix matches every live record.
pub(crate) fn read_prefix(
    conn: &Connection,
    schema: &Schema,
    codec: &RecordCodec,
    prefix: &str,
    limit: usize,
    offset: usize,
) -> Result<Vec<Record>> {
    let upper = prefix_upper_bound(prefix);

    let mut sql = format!(
        "SELECT key, value, expires_at FROM {} WHERE key >= :prefix",
        schema.table()
    );
    if upper.is_some() {
        sql.push_str(" AND key < :upper");
    }
    let _ = write!(
        sql,
        " AND {} ORDER BY key ASC LIMIT :limit OFFSET :offset",
        codec.live_predicate()
    );

    let mut stmt = Statement::new(sql)
        .bind(":prefix", Value::Text(prefix.to_string()))
        .bind(":limit", Value::Integer(limit_param(limit)))
        .bind(
            ":offset",
            Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)),
        );
    if let Some(upper) = upper {
        stmt = stmt.bind(":upper", Value::Text(upper));
    }
    let stmt = codec.bind_clock(stmt);

    let mut prepared = conn.prepare_cached(&stmt.sql)?;
    let records = prepared
        .query_map(stmt.named().as_slice(), RecordCodec::decode)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}

/// SQLite treats a negative LIMIT as "no limit".
fn limit_param(limit: usize) -> i64 {
    if limit == 0 {
        -1
    } else {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }
}

/// Smallest string greater than every string starting with `prefix`.
///
/// Under byte-wise (BINARY) collation UTF-8 orders like code points, so
/// incrementing the last code point that can be incremented gives an
/// exclusive upper bound for the prefix range. Returns `None` when no such
/// bound exists (empty prefix, or only `char::MAX`).
pub(crate) fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(next) = next_char(last) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

fn next_char(c: char) -> Option<char> {
    match c {
        char::MAX => None,
        '\u{D7FF}' => Some('\u{E000}'),
        _ => char::from_u32(u32::from(c) + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upper_bound_simple() {
        assert_eq!(prefix_upper_bound("a").as_deref(), Some("b"));
        assert_eq!(prefix_upper_bound("key").as_deref(), Some("kez"));
        assert_eq!(prefix_upper_bound("user:").as_deref(), Some("user;"));
    }

    #[test]
    fn test_upper_bound_edges() {
        assert_eq!(prefix_upper_bound(""), None);
        assert_eq!(prefix_upper_bound("\u{10FFFF}"), None);
        assert_eq!(prefix_upper_bound("a\u{10FFFF}").as_deref(), Some("b"));
        assert_eq!(prefix_upper_bound("\u{D7FF}").as_deref(), Some("\u{E000}"));
    }

    #[test]
    fn test_upper_bound_orders_bytewise() {
        let prefix = "caf\u{e9}";
        let upper = prefix_upper_bound(prefix).unwrap();
        for key in ["caf\u{e9}", "caf\u{e9}\u{10FFFF}", "caf\u{e9}zzz"] {
            assert!(key.as_bytes() >= prefix.as_bytes());
            assert!(key.as_bytes() < upper.as_bytes());
        }
        assert!("caf\u{ea}".as_bytes() >= upper.as_bytes());
    }

    #[test]
    fn test_limit_param() {
        assert_eq!(limit_param(0), -1);
        assert_eq!(limit_param(99), 99);
    }
}
