//! Connection provisioning.
//!
//! Opens the first reachable node, pings it, and shares the resulting
//! handle between all clones of a store.
//!
//! Every operation carries a [`Ticket`] with its deadline. A ticket that
//! expires while waiting for the handle never runs; one that expires while
//! running is interrupted, which rolls back its statement.

use parking_lot::Mutex;
use rusqlite::{Connection, InterruptHandle};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::constants::{MAX_TIMEOUT_MS, MEMORY_NODE};
use crate::error::{Error, Result};

/// Identity and deadline of one operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ticket {
    id: u64,
    budget: Duration,
    deadline: Instant,
}

impl Ticket {
    pub fn budget(&self) -> Duration {
        self.budget
    }
}

/// Operation currently holding the handle.
#[derive(Debug)]
struct Running {
    id: u64,
    interrupted: bool,
}

/// Shared SQLite handle opened from a list of candidate nodes.
///
/// # Thread Safety
///
/// The connection is protected by a Mutex. Acquisition is bounded by the
/// operation's deadline so a stuck holder surfaces as [`Error::Timeout`]
/// instead of blocking forever.
pub(crate) struct ConnectionProvider {
    conn: Mutex<Option<Connection>>,
    interrupt: InterruptHandle,
    running: Mutex<Option<Running>>,
    next_ticket: AtomicU64,
    closed: AtomicBool,
    endpoint: String,
}

impl ConnectionProvider {
    /// Tries each node in order and keeps the first that answers a ping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if no node can be opened and pinged.
    pub fn connect(nodes: &[String], busy_timeout: Duration) -> Result<Self> {
        let mut last_error = None;

        for node in nodes {
            match open_node(node, busy_timeout) {
                Ok(conn) => {
                    debug!(node = %node, "Connected to node");
                    return Ok(Self {
                        interrupt: conn.get_interrupt_handle(),
                        conn: Mutex::new(Some(conn)),
                        running: Mutex::new(None),
                        next_ticket: AtomicU64::new(0),
                        closed: AtomicBool::new(false),
                        endpoint: node.clone(),
                    });
                },
                Err(e) => {
                    warn!(node = %node, error = %e, "Node unavailable");
                    last_error = Some(format!("{node}: {e}"));
                },
            }
        }

        Err(Error::connection(last_error.map_or_else(
            || "no nodes configured".to_string(),
            |e| format!("no reachable node (last error: {e})"),
        )))
    }

    /// Node this provider is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issues a ticket whose deadline is `budget` from now.
    pub fn ticket(&self, budget: Duration) -> Ticket {
        let now = Instant::now();
        let deadline = now
            .checked_add(budget)
            .unwrap_or_else(|| now + Duration::from_millis(MAX_TIMEOUT_MS));
        Ticket {
            id: self.next_ticket.fetch_add(1, Ordering::Relaxed),
            budget,
            deadline,
        }
    }

    /// Runs `f` with exclusive access to the connection within `wait`.
    ///
    /// # Errors
    ///
    /// See [`Self::with_ticket`].
    pub fn with_connection<T>(
        &self,
        wait: Duration,
        f: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        self.with_ticket(self.ticket(wait), f)
    }

    /// Runs `f` with exclusive access to the connection, unless `ticket`
    /// expires first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the handle is not free before the
    /// deadline or `f` was interrupted by [`Self::interrupt`],
    /// [`Error::Closed`] after [`Self::close`], or whatever `f` returns.
    pub fn with_ticket<T>(
        &self,
        ticket: Ticket,
        f: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self
            .conn
            .try_lock_until(ticket.deadline)
            .ok_or(Error::Timeout(ticket.budget))?;
        let conn = guard.as_mut().ok_or(Error::Closed)?;
        if Instant::now() >= ticket.deadline {
            return Err(Error::Timeout(ticket.budget));
        }

        *self.running.lock() = Some(Running {
            id: ticket.id,
            interrupted: false,
        });
        let result = f(conn);
        let interrupted = self
            .running
            .lock()
            .take()
            .is_some_and(|running| running.interrupted);

        match result {
            Err(e) if interrupted => {
                debug!(error = %e, "Operation interrupted at deadline");
                Err(Error::Timeout(ticket.budget))
            },
            other => other,
        }
    }

    /// Interrupts the statement running under `ticket`, if any.
    ///
    /// A no-op when another operation holds the handle or `ticket` has
    /// already finished.
    pub fn interrupt(&self, ticket: Ticket) {
        let mut running = self.running.lock();
        if let Some(current) = running.as_mut()
            && current.id == ticket.id
        {
            current.interrupted = true;
            self.interrupt.interrupt();
        }
    }

    /// Drops the connection. Returns false if it was already closed.
    ///
    /// Waits for an in-flight operation to release the handle.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        drop(self.conn.lock().take());
        true
    }

    /// Non-blocking: never waits on the handle.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn hold(&self) -> parking_lot::MutexGuard<'_, Option<Connection>> {
        self.conn.lock()
    }
}

fn open_node(node: &str, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    if node != MEMORY_NODE && !node.starts_with("file:") {
        // Parent directory creation is best effort; open reports the real failure.
        if let Some(parent) = Path::new(node).parent()
            && !parent.as_os_str().is_empty()
        {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let conn = Connection::open(node)?;
    conn.busy_timeout(busy_timeout.min(Duration::from_millis(MAX_TIMEOUT_MS)))?;

    // In-memory databases answer "memory"; file databases switch to WAL.
    let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    debug!(node = %node, journal_mode = %mode, "Configured connection");

    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
    Ok(conn)
}
