//! Transaction control and the single-attempt transaction body.
//! The retry loop across attempts lives in [`crate::pool`], since a retry may
//! need a freshly acquired connection if the previous one died; this module
//! only knows how to run START/COMMIT/ROLLBACK around one user action.

use std::sync::Arc;

use rand::Rng;

use edb_errors::SHOULD_RETRY;
use edb_protocol::common::State as WireState;
use edb_protocol::encoding::Annotations;
use edb_protocol::query_arg::QueryArgs;
use edb_protocol::QueryResult;

use crate::errors::Error;
use crate::facade;
use crate::raw::{Connection, State};

/// `START TRANSACTION` options. Isolation is always
/// `SERIALIZABLE`; only access mode and deferrability vary.
#[derive(Debug, Clone, Copy)]
pub struct TransactionOptions {
    pub readonly: bool,
    pub deferrable: bool,
}

impl Default for TransactionOptions {
    fn default() -> TransactionOptions {
        TransactionOptions { readonly: false, deferrable: false }
    }
}

impl TransactionOptions {
    fn start_statement(&self) -> String {
        format!(
            "START TRANSACTION ISOLATION SERIALIZABLE, {}, {};",
            if self.readonly { "READ ONLY" } else { "READ WRITE" },
            if self.deferrable { "DEFERRABLE" } else { "NOT DEFERRABLE" },
        )
    }
}

/// Retry rule for a transaction attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    pub attempts: u32,
}

impl Default for RetryOptions {
    fn default() -> RetryOptions {
        RetryOptions { attempts: 3 }
    }
}

impl RetryOptions {
    pub fn backoff(&self, attempt: u32) -> std::time::Duration {
        let base_ms = 100u64.saturating_mul(1u64 << attempt.min(16));
        let jitter_ms = rand::rng().random_range(0..100);
        std::time::Duration::from_millis(base_ms + jitter_ms)
    }
}

/// The restricted handle passed to a transaction body. Every call on it runs directly against the
/// connection reserved for this attempt; nothing here retries or reconnects.
pub struct Transaction<'a> {
    conn: &'a mut Connection,
    state: WireState,
    annotations: Arc<Annotations>,
}

impl<'a> Transaction<'a> {
    fn new(conn: &'a mut Connection, state: WireState, annotations: Arc<Annotations>) -> Transaction<'a> {
        Transaction { conn, state, annotations }
    }

    fn track_state(&mut self, new_state: Option<WireState>) {
        if let Some(new_state) = new_state {
            self.state = new_state;
        }
    }

    pub async fn execute<A: QueryArgs>(&mut self, query: &str, args: &A) -> Result<(), Error> {
        let resp = facade::execute(self.conn, query, args, &self.state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(())
    }

    pub async fn query<R, A>(&mut self, query: &str, args: &A) -> Result<Vec<R>, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        let resp = facade::query(self.conn, query, args, &self.state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn query_single<R, A>(&mut self, query: &str, args: &A) -> Result<Option<R>, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        let resp = facade::query_single(self.conn, query, args, &self.state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn query_required_single<R, A>(&mut self, query: &str, args: &A) -> Result<R, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        let resp = facade::query_required_single(self.conn, query, args, &self.state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn query_json<A: QueryArgs>(&mut self, query: &str, args: &A) -> Result<String, Error> {
        let resp = facade::query_json(self.conn, query, args, &self.state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn query_single_json<A: QueryArgs>(&mut self, query: &str, args: &A) -> Result<Option<String>, Error> {
        let resp = facade::query_single_json(self.conn, query, args, &self.state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }
}

/// Runs one transaction attempt against `conn`: START, the user action,
/// COMMIT or ROLLBACK. Returns the action's result; a
/// `ShouldRetry`-tagged error means the caller should retry the whole
/// attempt, per the monotonicity invariant that `ShouldReconnect`
/// implies `ShouldRetry`.
pub async fn run_attempt<T, F, Fut>(
    conn: &mut Connection,
    state: WireState,
    annotations: Arc<Annotations>,
    opts: &TransactionOptions,
    action: F,
) -> Result<T, Error>
where
    F: FnOnce(Transaction<'_>) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let state = start(conn, &state, &annotations, opts).await?;
    let post_start_state = state.clone();

    let result = {
        let txn = Transaction::new(&mut *conn, state, annotations.clone());
        action(txn).await
    };

    match result {
        Ok(value) => match commit(conn, &post_start_state, &annotations).await {
            Ok(()) => Ok(value),
            Err(e) => Err(e),
        },
        Err(e) => {
            rollback(conn, &post_start_state, &annotations).await;
            Err(e)
        }
    }
}

async fn start(
    conn: &mut Connection,
    state: &WireState,
    annotations: &Arc<Annotations>,
    opts: &TransactionOptions,
) -> Result<WireState, Error> {
    let stmt = opts.start_statement();
    let resp = facade::execute(conn, &stmt, &(), state as &dyn State, annotations).await?;
    Ok(resp.new_state.unwrap_or_else(|| state.clone()))
}

async fn commit(conn: &mut Connection, state: &WireState, annotations: &Arc<Annotations>) -> Result<(), Error> {
    facade::execute(conn, "COMMIT;", &(), state as &dyn State, annotations)
        .await
        .map(|_| ())
}

async fn rollback(conn: &mut Connection, state: &WireState, annotations: &Arc<Annotations>) {
    if conn.is_consistent() {
        let _ = facade::execute(conn, "ROLLBACK;", &(), state as &dyn State, annotations).await;
    }
}

pub fn should_retry(err: &Error) -> bool {
    err.has_tag(&SHOULD_RETRY)
}
