//! Type definitions for the store.
//!
//! Contains the record returned by reads and the options that shape them.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A single key-value record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Unique, non-empty key
    pub key: String,
    /// Opaque value bytes
    pub value: Vec<u8>,
    /// Absolute expiry instant. `None` = never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Creates a record that never expires.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expires_at: None,
        }
    }

    /// Remaining time to live measured against the local clock.
    ///
    /// `None` for permanent records. Records past their expiry report zero.
    pub fn ttl(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| (at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Checks if this record is logically dead at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Options for [`crate::KvStore::read`].
///
/// The default is an exact-key lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Treat the key as a prefix rather than an exact match
    pub prefix: bool,
    /// Maximum records returned in prefix mode. 0 = unbounded.
    pub limit: usize,
    /// Records skipped in prefix mode, after ordering and before the limit
    pub offset: usize,
}

impl ReadOptions {
    /// Exact-key lookup.
    pub const fn exact() -> Self {
        Self {
            prefix: false,
            limit: 0,
            offset: 0,
        }
    }

    /// Ordered prefix scan with no limit.
    pub const fn prefix() -> Self {
        Self {
            prefix: true,
            limit: 0,
            offset: 0,
        }
    }

    /// Cap the number of records returned.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Skip the first `offset` matches.
    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}
