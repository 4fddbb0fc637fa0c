//! Expiration policy.
//!
//! Two mechanisms work together:
//!
//! - **Active filtering**: every read applies [`RecordCodec::live_predicate`],
//!   which is sufficient for correctness on its own.
//! - **Passive reclamation**: [`purge_batch`] physically removes expired
//!   rows. The [`ReclaimerHandle`] task runs it periodically to bound
//!   storage growth; nothing on the read path depends on it.

use rusqlite::Connection;
use rusqlite::types::Value;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::codec::{RecordCodec, Statement};
use super::schema::Schema;
use super::sql::WeakSqlStore;
use crate::error::{Error, Result};

/// Removes up to `batch` expired rows, oldest expiry first.
///
/// Returns the number of rows removed.
pub(crate) fn purge_batch(
    conn: &Connection,
    schema: &Schema,
    codec: &RecordCodec,
    batch: usize,
) -> Result<usize> {
    let stmt = Statement::new(format!(
        "DELETE FROM {table} WHERE key IN (
            SELECT key FROM {table} WHERE {expired} ORDER BY expires_at LIMIT :batch
        )",
        table = schema.table(),
        expired = codec.expired_predicate(),
    ))
    .bind(
        ":batch",
        Value::Integer(i64::try_from(batch).unwrap_or(i64::MAX)),
    );
    let stmt = codec.bind_clock(stmt);

    let removed = conn
        .prepare_cached(&stmt.sql)?
        .execute(stmt.named().as_slice())?;
    Ok(removed)
}

/// Handle to a running background reclamation task.
///
/// Dropping the handle does not stop the task; it stops on
/// [`ReclaimerHandle::shutdown`], when the store is closed, or once every
/// clone of the store has been dropped.
#[derive(Debug)]
pub struct ReclaimerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReclaimerHandle {
    /// Spawns the reclamation loop on the current tokio runtime.
    pub(crate) fn spawn(store: WeakSqlStore, every: Duration) -> Self {
        let (shutdown, signal) = watch::channel(false);
        let task = tokio::spawn(run_reclaimer(store, every, signal));
        Self { shutdown, task }
    }

    /// Signals the task to stop after its current pass.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Returns true while the task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signals shutdown and waits for the task to exit.
    pub async fn stop(self) {
        self.shutdown();
        let _ = self.task.await;
    }
}

async fn run_reclaimer(store: WeakSqlStore, every: Duration, mut signal: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval = ?every, "Starting reclamation loop");

    loop {
        tokio::select! {
            _ = interval.tick() => {},
            changed = signal.changed() => {
                if changed.is_err() || *signal.borrow() {
                    break;
                }
                continue;
            },
        }

        let Some(store) = store.upgrade() else {
            break;
        };

        match store.purge_expired().await {
            Ok(0) => {},
            Ok(removed) => debug!(table = %store.table(), removed, "Reclaimed expired rows"),
            Err(Error::Closed) => break,
            Err(e) => warn!(table = %store.table(), error = %e, "Reclamation pass failed"),
        }
    }

    debug!("Reclamation loop stopped");
}
