//! # sqlkv
//!
//! A durable key-value store with per-record time-to-live and ordered
//! prefix reads, backed by SQLite.
//!
//! - **Upserts** replace value and expiry atomically in a single statement
//! - **Expired records** are invisible to every read as soon as their TTL
//!   elapses, whether or not they have been physically removed
//! - **Prefix reads** return matches in byte-wise ascending key order with
//!   limit and offset applied after ordering
//! - **Reclamation** of expired rows runs as an optional background task
//!
//! ```no_run
//! use sqlkv::{KvStore, ReadOptions, SqlStore, StoreConfig};
//! use std::time::Duration;
//!
//! # async fn demo() -> sqlkv::Result<()> {
//! let config = StoreConfig::new("sessions")
//!     .with_node("/var/lib/sqlkv/sessions.db")
//!     .reclaim_every(Duration::from_secs(60));
//! let store = SqlStore::open(config).await?;
//!
//! store.write("session:42", b"alice", Duration::from_secs(3600)).await?;
//! let record = store.read("session:42", ReadOptions::exact()).await?;
//! assert_eq!(record[0].value, b"alice");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod store;

pub use config::StoreConfig;
pub use error::{Error, ErrorKind, Result};
pub use store::{ExpiryClock, KvStore, ReadOptions, ReclaimerHandle, Record, SqlStore};
