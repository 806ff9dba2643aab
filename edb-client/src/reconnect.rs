//! Wraps a protocol connection so a caller never has to notice that the
//! socket died and was replaced. Nothing here pools connections
//! or retries a user's transaction body; it only guarantees that calling in
//! on a closed or inconsistent connection produces a fresh, authenticated
//! one before the flow runs.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use edb_errors::SHOULD_RECONNECT;

use crate::config::ConnConfig;
use crate::errors::{ClientConnectionClosedError, Error, ErrorKind};
use crate::raw::Connection;

/// Bounds of the randomized backoff between reconnect attempts.
const BACKOFF_MIN_MS: u64 = 10;
const BACKOFF_MAX_MS: u64 = 210;

pub struct ReconnectingConnection {
    config: ConnConfig,
    inner: Option<Connection>,
    closed: bool,
}

impl ReconnectingConnection {
    pub fn new(config: ConnConfig) -> ReconnectingConnection {
        ReconnectingConnection { config, inner: None, closed: false }
    }

    /// Runs `flow` against a live, consistent connection, reconnecting first
    /// if the previous call left the connection closed or mid-request.
    pub async fn with_connection<T, F, Fut>(&mut self, flow: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Connection) -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        if self.closed {
            return Err(ClientConnectionClosedError::with_message(
                "connection has been explicitly closed",
            ));
        }
        let conn = self.ensure_connected().await?;
        flow(conn).await
    }

    /// Returns a reference to a connection known to be open and not
    /// mid-request, reconnecting within `wait_until_available` if needed.
    async fn ensure_connected(&mut self) -> Result<&mut Connection, Error> {
        if matches!(&self.inner, Some(conn) if conn.is_consistent()) {
            return Ok(self.inner.as_mut().unwrap());
        }
        self.inner = None;

        let deadline = Instant::now() + self.config.wait_until_available;
        let mut last_err = None;
        loop {
            match Connection::connect(&self.config).await {
                Ok(conn) => {
                    self.inner = Some(conn);
                    return Ok(self.inner.as_mut().unwrap());
                }
                Err(e) => {
                    if !e.has_tag(&SHOULD_RECONNECT) || Instant::now() >= deadline {
                        return Err(e);
                    }
                    last_err = Some(e);
                }
            }
            let backoff = rand::rng().random_range(BACKOFF_MIN_MS..=BACKOFF_MAX_MS);
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(last_err.expect("loop only continues after recording an error"));
            }
            tokio::time::sleep(Duration::from_millis(backoff).min(remaining)).await;
        }
    }

    /// Terminates the underlying socket, if any, and marks the connection
    /// refusing further operations.
    pub async fn close(&mut self) {
        self.closed = true;
        if let Some(conn) = self.inner.take() {
            conn.close().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
