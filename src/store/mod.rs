//! Key-value store with TTL expiration on a relational engine.
//!
//! Records live in one SQLite table per keyspace. Writes are single-statement
//! upserts, reads filter out expired rows at query time, and an optional
//! background task reclaims the space they occupy.
//!
//! # Example
//!
//! ```no_run
//! use sqlkv::{KvStore, ReadOptions, SqlStore, StoreConfig};
//! use std::time::Duration;
//!
//! # async fn demo() -> sqlkv::Result<()> {
//! let store = SqlStore::open(StoreConfig::memory("cache")).await?;
//!
//! store.write("user:1", b"alice", Duration::ZERO).await?;
//! store.write("user:2", b"bob", Duration::from_secs(60)).await?;
//!
//! let users = store.read("user:", ReadOptions::prefix()).await?;
//! assert_eq!(users.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Custom Stores
//!
//! Implement the `KvStore` trait to put another engine behind the same
//! interface.

mod backend;
mod codec;
mod connection;
mod delete;
mod expiry;
mod read;
mod schema;
mod sql;
mod types;
mod write;


// Re-export the public API
pub use backend::KvStore;
pub use codec::ExpiryClock;
pub use expiry::ReclaimerHandle;
pub use sql::SqlStore;
pub use types::{ReadOptions, Record};
