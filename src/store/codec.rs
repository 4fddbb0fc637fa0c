//! Translation between [`Record`] and its relational row.
//!
//! Rows are `(key TEXT, value BLOB, expires_at INTEGER)` where `expires_at`
//! is milliseconds since the Unix epoch, or NULL for permanent records.
//!
//! This is the only module that knows which clock decides expiry. Every
//! statement asks the codec for the "now" expression and for its bindings,
//! so switching [`ExpiryClock`] changes the write side and the read side
//! together.

use chrono::{DateTime, Utc};
use rusqlite::ToSql;
use rusqlite::types::Value;
use serde::Deserialize;
use std::time::Duration;

use super::types::Record;
use crate::constants::MAX_TTL_MILLIS;

/// Current engine time in epoch milliseconds, evaluated by SQLite.
const ENGINE_NOW_MS: &str = "CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER)";

/// Named parameter carrying the caller's clock.
const CALLER_NOW_PARAM: &str = ":now";

/// Clock used to compute and compare expiry instants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryClock {
    /// The database engine's clock. Every store attached to the same
    /// database agrees on one time source regardless of local drift.
    #[default]
    Engine,
    /// The local process clock, bound into each statement.
    Caller,
}

/// A SQL statement with its named parameters.
#[derive(Debug)]
pub(crate) struct Statement {
    pub sql: String,
    pub params: Vec<(&'static str, Value)>,
}

impl Statement {
    pub fn new(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn bind(mut self, name: &'static str, value: Value) -> Self {
        self.params.push((name, value));
        self
    }

    /// Parameters in the shape rusqlite accepts for named binding.
    pub fn named(&self) -> Vec<(&str, &dyn ToSql)> {
        self.params
            .iter()
            .map(|(name, value)| (*name, value as &dyn ToSql))
            .collect()
    }
}

/// Record codec bound to one [`ExpiryClock`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordCodec {
    clock: ExpiryClock,
}

impl RecordCodec {
    pub const fn new(clock: ExpiryClock) -> Self {
        Self { clock }
    }

    pub const fn clock(&self) -> ExpiryClock {
        self.clock
    }

    /// SQL expression for "now" in epoch milliseconds.
    pub const fn now_sql(&self) -> &'static str {
        match self.clock {
            ExpiryClock::Engine => ENGINE_NOW_MS,
            ExpiryClock::Caller => CALLER_NOW_PARAM,
        }
    }

    /// Predicate selecting rows that are still live.
    pub fn live_predicate(&self) -> String {
        format!("(expires_at IS NULL OR expires_at > {})", self.now_sql())
    }

    /// Predicate selecting rows past their expiry.
    pub fn expired_predicate(&self) -> String {
        format!(
            "(expires_at IS NOT NULL AND expires_at <= {})",
            self.now_sql()
        )
    }

    /// Expression computing `expires_at` from the `:ttl_ms` parameter.
    pub fn expires_at_sql(&self) -> String {
        format!(
            "CASE WHEN :ttl_ms IS NULL THEN NULL ELSE {} + :ttl_ms END",
            self.now_sql()
        )
    }

    /// Binds the caller clock when the statement references it.
    #[must_use]
    pub fn bind_clock(&self, stmt: Statement) -> Statement {
        match self.clock {
            ExpiryClock::Engine => stmt,
            ExpiryClock::Caller => {
                stmt.bind(CALLER_NOW_PARAM, Value::Integer(Utc::now().timestamp_millis()))
            },
        }
    }

    /// Encodes a relative TTL as the `:ttl_ms` parameter.
    ///
    /// Zero means "never expires". Sub-millisecond TTLs round up so a
    /// positive TTL never turns into a permanent record.
    pub fn ttl_param(ttl: Duration) -> Value {
        Self::ttl_millis(ttl).map_or(Value::Null, Value::Integer)
    }

    pub fn ttl_millis(ttl: Duration) -> Option<i64> {
        if ttl.is_zero() {
            return None;
        }
        let millis = ttl.as_nanos().div_ceil(1_000_000);
        Some(i64::try_from(millis).map_or(MAX_TTL_MILLIS, |ms| ms.min(MAX_TTL_MILLIS)))
    }

    /// Decodes a `(key, value, expires_at)` row.
    pub fn decode(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
        let key: String = row.get(0)?;
        let value: Vec<u8> = row.get(1)?;
        let expires_at: Option<i64> = row.get(2)?;
        let expires_at = expires_at
            .map(|ms| {
                DateTime::<Utc>::from_timestamp_millis(ms)
                    .ok_or(rusqlite::Error::IntegralValueOutOfRange(2, ms))
            })
            .transpose()?;

        Ok(Record {
            key,
            value,
            expires_at,
        })
    }
}
