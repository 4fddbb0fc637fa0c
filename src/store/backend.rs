//! The abstract store interface.
//!
//! Defines the operations every store implementation exposes. Callers that
//! only need these operations can hold a `dyn KvStore`.

use async_trait::async_trait;
use std::time::Duration;

use super::types::{ReadOptions, Record};
use crate::error::Result;

/// Key-value store with per-record TTL and ordered prefix reads.
///
/// All implementations must be thread-safe (`Send + Sync`) for use with
/// tokio. Expired records are never returned by any read path.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Prepares backing storage. Idempotent; safe to call on every start.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Initialization`] if setup fails. No other
    /// operation succeeds until this has.
    async fn init(&self) -> Result<()>;

    /// Inserts or fully replaces the record for `key`.
    ///
    /// A zero `ttl` means the record never expires. Otherwise it expires
    /// `ttl` after the write.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKey`] for an empty key and
    /// [`crate::Error::Write`] if the database rejects the upsert.
    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Reads by exact key or by prefix.
    ///
    /// Exact mode returns exactly one record. Prefix mode returns live
    /// records whose key starts with `key`, ascending by key, honouring
    /// `offset` and then `limit`; no match is an empty vector.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] in exact mode if the key is
    /// absent or expired.
    async fn read(&self, key: &str, options: ReadOptions) -> Result<Vec<Record>>;

    /// Removes `key`. Idempotent: a missing or expired key is success.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Every live record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn list(&self) -> Result<Vec<Record>>;

    /// Releases the backing handle. Later operations fail with
    /// [`crate::Error::Closed`].
    fn close(&self);

    /// Checks if a live record exists for `key`.
    ///
    /// Default implementation uses `read()`, but implementations may
    /// override for efficiency.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn exists(&self, key: &str) -> Result<bool> {
        match self.read(key, ReadOptions::exact()).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
