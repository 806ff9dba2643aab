//! The connection pool: acquire/release protocols, idle-timeout
//! eviction, and the capacity bookkeeping that keeps
//! `free + potential + in_use == concurrency` at all times outside the
//! acquire/release critical sections.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Notify, Semaphore};

use crate::config::ConnConfig;
use crate::errors::{Error, ErrorKind, InterfaceError};
use crate::raw::{Connection, PoolConnection};

/// An idle connection sitting in `free`, paired with the cancel half of its
/// eviction sweep. Sending on `cancel` is the "takeover signal"; if it fails the
/// sweep already fired and the slot is (or is about to be) empty.
struct FreeSlot {
    conn: Arc<Mutex<Option<Connection>>>,
    cancel: oneshot::Sender<()>,
}

struct PoolState {
    concurrency: Mutex<Option<usize>>,
    free: Mutex<VecDeque<FreeSlot>>,
    potential: Semaphore,
    closed: AtomicBool,
    initialized: AtomicBool,
    idle_timeout: Mutex<Duration>,
    free_notify: Notify,
}

impl PoolState {
    fn take_idle(&self) -> Option<Connection> {
        loop {
            let slot = self.free.lock().unwrap().pop_front()?;
            if slot.cancel.send(()).is_ok() {
                if let Some(conn) = slot.conn.lock().unwrap().take() {
                    return Some(conn);
                }
            }
        }
    }

    fn push_free(self: &Arc<Self>, conn: Connection, idle_timeout: Duration) {
        if idle_timeout.is_zero() {
            let concurrency = self.concurrency.lock().unwrap().unwrap_or_else(default_concurrency);
            let mut free = self.free.lock().unwrap();
            if free.len() >= concurrency {
                drop(free);
                let state = self.clone();
                tokio::spawn(async move {
                    conn.close().await;
                    state.potential.add_permits(1);
                });
            } else {
                let (cancel, _never_fires) = oneshot::channel();
                free.push_back(FreeSlot { conn: Arc::new(Mutex::new(Some(conn))), cancel });
                drop(free);
                self.free_notify.notify_one();
            }
            return;
        }

        let slot = Arc::new(Mutex::new(Some(conn)));
        let (cancel, mut cancel_rx) = oneshot::channel();
        self.free.lock().unwrap().push_back(FreeSlot { conn: slot.clone(), cancel });
        self.free_notify.notify_one();

        let state = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = &mut cancel_rx => {}
                _ = tokio::time::sleep(idle_timeout) => {
                    if let Some(conn) = slot.lock().unwrap().take() {
                        tokio::spawn(async move { conn.close().await; });
                        state.potential.add_permits(1);
                    }
                }
            }
        });
    }

    /// Release protocol applied to a connection handed back by
    /// a dropped [`PoolConnection`].
    fn release(self: &Arc<Self>, conn: Connection) {
        if self.closed.load(Ordering::SeqCst) || !conn.is_consistent() {
            let state = self.clone();
            tokio::spawn(async move {
                conn.close().await;
                state.potential.add_permits(1);
            });
            return;
        }

        let idle_timeout = conn.session_idle_timeout().unwrap_or(*self.idle_timeout.lock().unwrap());
        self.push_free(conn, idle_timeout);
    }
}

fn default_concurrency() -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    cpus.max(crate::config::DEFAULT_POOL_CONCURRENCY)
}

/// Load-balancing pool of protocol connections to a single branch/database.
pub struct Pool {
    config: ConnConfig,
    state: Arc<PoolState>,
    release_tx: mpsc::UnboundedSender<Connection>,
}

impl Pool {
    pub fn new(config: ConnConfig) -> Pool {
        let state = Arc::new(PoolState {
            concurrency: Mutex::new(None),
            free: Mutex::new(VecDeque::new()),
            potential: Semaphore::new(0),
            closed: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            idle_timeout: Mutex::new(crate::config::DEFAULT_IDLE_TIMEOUT),
            free_notify: Notify::new(),
        });

        // Connections come back from a dropped `PoolConnection` over this
        // channel rather than a direct call, since `Drop` cannot run async
        // code or see what error (if any) the caller observed; consistency
        // of the connection itself is the only signal `release` needs.
        let (release_tx, mut release_rx) = mpsc::unbounded_channel();
        let release_state = state.clone();
        tokio::spawn(async move {
            while let Some(conn) = release_rx.recv().await {
                release_state.release(conn);
            }
        });

        Pool { config, state, release_tx }
    }

    fn closed_error() -> Error {
        InterfaceError::with_message("client closed")
    }

    /// Acquire protocol: eager first connection, then prefer an
    /// idle connection, else race a free slot against a capacity permit.
    pub async fn acquire(&self) -> Result<PoolConnection, Error> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(Self::closed_error());
        }

        if !self.state.initialized.load(Ordering::SeqCst) {
            let conn = Connection::connect(&self.config).await?;
            self.finish_initializing(&conn);
            return Ok(self.wrap(conn));
        }

        loop {
            // Register for notification before checking `free`, so a push
            // that races with this check is never missed (Notify's
            // "enable before check" rule).
            let notified = self.state.free_notify.notified();
            if let Some(conn) = self.state.take_idle() {
                return Ok(self.wrap(conn));
            }

            tokio::select! {
                biased;
                _ = notified => {
                    // a connection may have become free; loop around and
                    // try to take it (another waiter may win the race).
                }
                permit = self.state.potential.acquire() => {
                    let permit = permit.expect("semaphore is never closed");
                    permit.forget();
                    match Connection::connect(&self.config).await {
                        Ok(conn) => return Ok(self.wrap(conn)),
                        Err(e) => {
                            self.state.potential.add_permits(1);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    fn wrap(&self, conn: Connection) -> PoolConnection {
        PoolConnection::new(conn, self.release_tx.clone())
    }

    fn finish_initializing(&self, conn: &Connection) {
        if self
            .state
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let concurrency = conn
                .suggested_pool_concurrency()
                .unwrap_or_else(|| self.config.max_concurrency.unwrap_or_else(default_concurrency));
            *self.state.concurrency.lock().unwrap() = Some(concurrency);
            self.state.potential.add_permits(concurrency.saturating_sub(1));
        }
    }

    /// Close protocol: drains `concurrency` worth of capacity,
    /// closing every idle connection it finds and waiting for in-flight
    /// eviction sweeps to settle.
    pub async fn close(&self) -> Result<(), Error> {
        if self
            .state
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Self::closed_error());
        }

        let concurrency = self.state.concurrency.lock().unwrap().unwrap_or(0);
        let mut closers = Vec::new();
        for _ in 0..concurrency {
            if let Some(conn) = self.state.take_idle() {
                closers.push(tokio::spawn(async move { conn.close().await }));
            } else {
                let permit = self.state.potential.acquire().await.expect("semaphore is never closed");
                permit.forget();
            }
        }
        for closer in closers {
            let _ = closer.await;
        }
        Ok(())
    }

    pub fn concurrency(&self) -> Option<usize> {
        *self.state.concurrency.lock().unwrap()
    }
}
