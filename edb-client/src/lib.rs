//! Async client driver for a Gel/EdgeDB-compatible server: a binary wire
//! protocol engine (`raw`), a connection pool with idle-timeout eviction
//! (`pool`), and a retrying transaction orchestrator (`transaction`) built on
//! top of the query facade (`facade`) shared by both.
//!
//! [`Client`] is the only type most callers need: [`Client::new`] takes an
//! already-resolved [`config::ConnConfig`] (this crate never reads
//! environment variables, DSNs, or config files itself) and hands back a
//! handle whose `Execute`/`Query*` methods each acquire a pooled connection,
//! run, and release it, and whose [`Client::transaction`] retries its body
//! against a fresh connection on a `ShouldRetry`-tagged error.

pub mod caches;
pub mod config;
pub mod errors;
pub mod facade;
pub mod pool;
pub mod raw;
pub mod reconnect;
pub mod tls;
pub mod transaction;

use std::sync::{Arc, Mutex};

use edb_protocol::common::State as WireState;
use edb_protocol::encoding::Annotations;
use edb_protocol::query_arg::QueryArgs;
use edb_protocol::QueryResult;

use config::ConnConfig;
use errors::Error;
use pool::Pool;
use raw::State;
use transaction::{RetryOptions, Transaction, TransactionOptions};

/// A pooled handle to one branch/database. Cheap to clone:
/// every clone shares the same underlying [`Pool`] and session state.
#[derive(Clone)]
pub struct Client {
    pool: Arc<Pool>,
    state: Arc<Mutex<WireState>>,
    annotations: Arc<Annotations>,
    retry_options: RetryOptions,
    transaction_options: TransactionOptions,
}

pub fn create_client(config: ConnConfig) -> Client {
    Client::new(config)
}

impl Client {
    pub fn new(config: ConnConfig) -> Client {
        Client {
            pool: Arc::new(Pool::new(config)),
            state: Arc::new(Mutex::new(WireState::empty())),
            annotations: Arc::new(Annotations::new()),
            retry_options: RetryOptions::default(),
            transaction_options: TransactionOptions::default(),
        }
    }

    /// Returns a clone of this client that runs transactions with different
    /// retry rules.
    pub fn with_retry_options(&self, retry_options: RetryOptions) -> Client {
        Client { retry_options, ..self.clone() }
    }

    /// Returns a clone of this client that opens transactions with
    /// different access-mode/deferrability options.
    pub fn with_transaction_options(&self, transaction_options: TransactionOptions) -> Client {
        Client { transaction_options, ..self.clone() }
    }

    fn snapshot_state(&self) -> WireState {
        self.state.lock().unwrap().clone()
    }

    fn track_state(&self, new_state: Option<WireState>) {
        if let Some(new_state) = new_state {
            *self.state.lock().unwrap() = new_state;
        }
    }

    pub async fn ensure_connected(&self) -> Result<(), Error> {
        self.pool.acquire().await.map(drop)
    }

    pub async fn close(&self) -> Result<(), Error> {
        self.pool.close().await
    }

    pub async fn execute<A: QueryArgs>(&self, query: &str, args: &A) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;
        let state = self.snapshot_state();
        let resp = facade::execute(conn.inner(), query, args, &state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(())
    }

    pub async fn query<R, A>(&self, query: &str, args: &A) -> Result<Vec<R>, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        let mut conn = self.pool.acquire().await?;
        let state = self.snapshot_state();
        let resp = facade::query(conn.inner(), query, args, &state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn query_single<R, A>(&self, query: &str, args: &A) -> Result<Option<R>, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        let mut conn = self.pool.acquire().await?;
        let state = self.snapshot_state();
        let resp = facade::query_single(conn.inner(), query, args, &state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn query_required_single<R, A>(&self, query: &str, args: &A) -> Result<R, Error>
    where
        R: QueryResult,
        A: QueryArgs,
    {
        let mut conn = self.pool.acquire().await?;
        let state = self.snapshot_state();
        let resp =
            facade::query_required_single(conn.inner(), query, args, &state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn query_json<A: QueryArgs>(&self, query: &str, args: &A) -> Result<String, Error> {
        let mut conn = self.pool.acquire().await?;
        let state = self.snapshot_state();
        let resp = facade::query_json(conn.inner(), query, args, &state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn query_single_json<A: QueryArgs>(&self, query: &str, args: &A) -> Result<Option<String>, Error> {
        let mut conn = self.pool.acquire().await?;
        let state = self.snapshot_state();
        let resp =
            facade::query_single_json(conn.inner(), query, args, &state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn query_sql<R, A>(&self, query: &str, args: &A) -> Result<Vec<R>, Error>
    where
        R: QueryResult,
        R::State: Unpin,
        A: QueryArgs,
    {
        let mut conn = self.pool.acquire().await?;
        let state = self.snapshot_state();
        let resp = facade::query_sql(
            conn.inner(),
            query,
            args,
            &state as &dyn State,
            &self.annotations,
            edb_protocol::common::Cardinality::Many,
        )
        .await?;
        self.track_state(resp.new_state);
        Ok(resp.data)
    }

    pub async fn execute_sql<A: QueryArgs>(&self, query: &str, args: &A) -> Result<(), Error> {
        let mut conn = self.pool.acquire().await?;
        let state = self.snapshot_state();
        let resp = facade::execute_sql(conn.inner(), query, args, &state as &dyn State, &self.annotations).await?;
        self.track_state(resp.new_state);
        Ok(())
    }

    /// Runs `action` inside a transaction, retrying the whole attempt (fresh
    /// connection, fresh `START TRANSACTION`) up to
    /// `self.retry_options.attempts` times on a `ShouldRetry`-tagged error.
    pub async fn transaction<T, F, Fut>(&self, mut action: F) -> Result<T, Error>
    where
        F: FnMut(Transaction<'_>) -> Fut,
        Fut: std::future::Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0;
        loop {
            let mut conn = self.pool.acquire().await?;
            let state = self.snapshot_state();
            let result = transaction::run_attempt(
                conn.inner(),
                state,
                self.annotations.clone(),
                &self.transaction_options,
                &mut action,
            )
            .await;

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < self.retry_options.attempts && transaction::should_retry(&e) => {
                    attempt += 1;
                    drop(conn);
                    tokio::time::sleep(self.retry_options.backoff(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
