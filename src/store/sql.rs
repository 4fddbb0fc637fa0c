//! SQLite-backed [`KvStore`] implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::KvStore;
use super::codec::RecordCodec;
use super::connection::ConnectionProvider;
use super::expiry::{self, ReclaimerHandle};
use super::schema::Schema;
use super::types::{ReadOptions, Record};
use super::{delete, read, write};
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// How often a timed-out operation is re-interrupted until it stops.
const INTERRUPT_RETRY: Duration = Duration::from_millis(10);

struct Inner {
    database: String,
    provider: ConnectionProvider,
    schema: Schema,
    codec: RecordCodec,
    initialized: AtomicBool,
    reclaim_interval: Option<Duration>,
    reclaim_batch_size: usize,
    reclaimer: Mutex<Option<ReclaimerHandle>>,
}

/// Key-value store over one SQLite table.
///
/// Self-contained: all state comes from the [`StoreConfig`] passed at
/// construction, so any number of stores can coexist in one process.
///
/// # Thread Safety
///
/// `SqlStore` is `Clone` and can be shared across tasks. Clones share one
/// database handle; row-level consistency is left to SQLite.
///
/// # Example
///
/// ```no_run
/// use sqlkv::{KvStore, ReadOptions, SqlStore, StoreConfig};
/// use std::time::Duration;
///
/// # async fn demo() -> sqlkv::Result<()> {
/// let store = SqlStore::open(StoreConfig::new("sessions").with_node("/tmp/sessions.db")).await?;
///
/// store.write("session:42", b"alice", Duration::from_secs(3600)).await?;
/// let sessions = store.read("session:", ReadOptions::prefix().limit(10)).await?;
///
/// store.close();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SqlStore {
    inner: Arc<Inner>,
    timeout: Duration,
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore")
            .field("database", &self.inner.database)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Non-owning reference used by the reclamation task.
pub(crate) struct WeakSqlStore {
    inner: Weak<Inner>,
    timeout: Duration,
}

impl WeakSqlStore {
    pub fn upgrade(&self) -> Option<SqlStore> {
        self.inner.upgrade().map(|inner| SqlStore {
            inner,
            timeout: self.timeout,
        })
    }
}

impl SqlStore {
    /// Validates `config` and connects to the first reachable node.
    ///
    /// The store rejects data operations until [`KvStore::init`] succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid configuration and
    /// [`Error::Connection`] if no node answers.
    pub fn connect(config: StoreConfig) -> Result<Self> {
        let report = config.validate()?;
        for warning in &report.warnings {
            warn!(database = %config.database, "{warning}");
        }

        let timeout = config.timeout();
        let provider = ConnectionProvider::connect(&config.nodes, timeout)?;
        let schema = Schema::new(config.table_name());
        let codec = RecordCodec::new(config.clock);

        info!(
            database = %config.database,
            table = %schema.name(),
            endpoint = %provider.endpoint(),
            clock = ?codec.clock(),
            "Connected store"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                database: config.database.clone(),
                provider,
                schema,
                codec,
                initialized: AtomicBool::new(false),
                reclaim_interval: config.reclaim_interval(),
                reclaim_batch_size: config.reclaim_batch_size,
                reclaimer: Mutex::new(None),
            }),
            timeout,
        })
    }

    /// Connects, initializes the schema and starts reclamation if configured.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::connect`] or [`KvStore::init`].
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let store = Self::connect(config)?;
        store.init().await?;
        if let Some(every) = store.inner.reclaim_interval {
            store.spawn_reclaimer(every)?;
        }
        Ok(store)
    }

    /// Returns a clone whose operations use `timeout` as their deadline.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout,
        }
    }

    /// Deadline applied to each operation.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Logical keyspace identifier.
    pub fn database(&self) -> &str {
        &self.inner.database
    }

    /// Physical table name.
    pub fn table(&self) -> &str {
        self.inner.schema.name()
    }

    /// Node the store is connected to.
    pub fn endpoint(&self) -> &str {
        self.inner.provider.endpoint()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.provider.is_closed()
    }

    /// Keys of all live records, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let records = self.list().await?;
        Ok(records.into_iter().map(|record| record.key).collect())
    }

    /// Physically removes every expired row, one batch at a time.
    ///
    /// Returns the number of rows removed. The handle is released between
    /// batches so foreground operations interleave with a long purge.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn purge_expired(&self) -> Result<usize> {
        let batch = self.inner.reclaim_batch_size;
        let mut total = 0;
        loop {
            let removed = self
                .run(move |inner, conn| {
                    expiry::purge_batch(conn, &inner.schema, &inner.codec, batch)
                })
                .await?;
            total += removed;
            if removed < batch {
                break;
            }
            tokio::task::yield_now().await;
        }
        Ok(total)
    }

    /// Starts background reclamation every `every`.
    ///
    /// Replaces a reclaimer started earlier. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero interval or when no runtime is
    /// available, and [`Error::NotInitialized`] / [`Error::Closed`] if the
    /// store cannot serve operations.
    pub fn spawn_reclaimer(&self, every: Duration) -> Result<()> {
        self.ensure_ready()?;
        if every.is_zero() {
            return Err(Error::Config("reclaim interval cannot be 0".to_string()));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::Config(
                "reclamation requires a tokio runtime".to_string(),
            ));
        }

        let handle = ReclaimerHandle::spawn(self.downgrade(), every);
        if let Some(previous) = self.inner.reclaimer.lock().replace(handle) {
            previous.shutdown();
        }
        Ok(())
    }

    /// Returns true while a background reclaimer is running.
    pub fn reclaimer_running(&self) -> bool {
        self.inner
            .reclaimer
            .lock()
            .as_ref()
            .is_some_and(ReclaimerHandle::is_running)
    }

    pub(crate) fn downgrade(&self) -> WeakSqlStore {
        WeakSqlStore {
            inner: Arc::downgrade(&self.inner),
            timeout: self.timeout,
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidKey("key cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Runs `f` on the blocking pool once the store is ready.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner, &mut Connection) -> Result<T> + Send + 'static,
    {
        self.ensure_ready()?;
        self.run_unchecked(f).await
    }

    /// Runs `f` on the blocking pool, bounded by the operation deadline.
    ///
    /// Waiting for the shared handle counts against the same deadline. At
    /// the deadline the running statement is interrupted and the worker's
    /// real outcome is awaited, so [`Error::Timeout`] always means the
    /// operation did not take effect.
    async fn run_unchecked<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner, &mut Connection) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let ticket = inner.provider.ticket(self.timeout);
        let mut task = tokio::task::spawn_blocking(move || {
            inner
                .provider
                .with_ticket(ticket, |conn| f(&inner, conn))
        });

        if let Ok(joined) = tokio::time::timeout(ticket.budget(), &mut task).await {
            return joined?;
        }

        // Re-interrupt until the worker gives up; an interrupt that lands
        // between statements is otherwise lost.
        loop {
            self.inner.provider.interrupt(ticket);
            if let Ok(joined) = tokio::time::timeout(INTERRUPT_RETRY, &mut task).await {
                return joined?;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn provider(&self) -> &ConnectionProvider {
        &self.inner.provider
    }

    /// Runs arbitrary SQL through the regular operation path.
    #[cfg(test)]
    pub(crate) async fn execute_sql(&self, sql: String) -> Result<usize> {
        self.run(move |_, conn| Ok(conn.execute(&sql, [])?)).await
    }

    /// Rows physically present, live or not.
    #[cfg(test)]
    pub(crate) async fn physical_row_count(&self) -> Result<i64> {
        self.run(|inner, conn| {
            let sql = format!("SELECT count(*) FROM {}", inner.schema.table());
            Ok(conn.query_row(&sql, [], |row| row.get(0))?)
        })
        .await
    }
}

#[async_trait]
impl KvStore for SqlStore {
    async fn init(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        self.run_unchecked(|inner, conn| inner.schema.ensure(conn))
            .await
            .map_err(|e| match e {
                Error::Closed | Error::Initialization(_) => e,
                other => Error::Initialization(other.to_string()),
            })?;

        self.inner.initialized.store(true, Ordering::Release);
        info!(database = %self.database(), table = %self.table(), "Store initialized");
        Ok(())
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        Self::validate_key(key)?;
        debug!(key = %key, bytes = value.len(), ttl = ?ttl, "Write");

        let key = key.to_string();
        let value = value.to_vec();
        self.run(move |inner, conn| {
            write::upsert(conn, &inner.schema, &inner.codec, &key, value, ttl)
        })
        .await
    }

    async fn read(&self, key: &str, options: ReadOptions) -> Result<Vec<Record>> {
        debug!(
            key = %key,
            prefix = options.prefix,
            limit = options.limit,
            offset = options.offset,
            "Read"
        );

        let key = key.to_string();
        if options.prefix {
            self.run(move |inner, conn| {
                read::read_prefix(
                    conn,
                    &inner.schema,
                    &inner.codec,
                    &key,
                    options.limit,
                    options.offset,
                )
            })
            .await
        } else {
            Self::validate_key(&key)?;
            self.run(move |inner, conn| {
                read::read_exact(conn, &inner.schema, &inner.codec, &key).map(|r| vec![r])
            })
            .await
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        Self::validate_key(key)?;
        debug!(key = %key, "Delete");

        let key = key.to_string();
        self.run(move |inner, conn| delete::delete(conn, &inner.schema, &key))
            .await
    }

    async fn list(&self) -> Result<Vec<Record>> {
        self.run(|inner, conn| read::read_prefix(conn, &inner.schema, &inner.codec, "", 0, 0))
            .await
    }

    fn close(&self) {
        if let Some(reclaimer) = self.inner.reclaimer.lock().take() {
            reclaimer.shutdown();
        }
        if self.inner.provider.close() {
            info!(database = %self.database(), table = %self.table(), "Store closed");
        }
    }
}
