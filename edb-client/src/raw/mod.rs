//! The raw, unpooled protocol connection and the types its request methods
//! speak in. Nothing
//! in this module retries, reconnects, or manages idle timeouts — that is
//! layered on top in [`crate::reconnect`] and [`crate::pool`].

pub mod connection;
pub mod queries;

use edb_protocol::common::State as WireState;
use edb_protocol::descriptors::Typedesc;
use edb_protocol::server_message::{CommandComplete1, Data, ServerMessage};
use edb_protocol::QueryResult;

pub use crate::errors::{Description, QueryCapabilities};
use crate::errors::{Error, ErrorKind, ProtocolEncodingError, ProtocolOutOfOrderError};

pub use connection::{Connection, Mode};
pub(crate) use queries::Guard;

/// Encodes the session state a request should run under. A higher layer (`edb-client::pool`) tracks the logical session
/// state (the active module, aliases, config) and implements this to turn it
/// into the wire `State` blob, re-describing it against the connection's
/// current `state_desc` if the server has invalidated the cached one.
pub trait State {
    fn encode(&self, state_desc: &Typedesc) -> Result<WireState, Error>;
}

/// The degenerate case: the wire blob is opaque, so the
/// blob itself already is its own encoding, regardless of `state_desc`.
impl State for WireState {
    fn encode(&self, _state_desc: &Typedesc) -> Result<WireState, Error> {
        Ok(self.clone())
    }
}

/// The outcome of one request: the server's free-form status string, the
/// payload, an updated session state (if the server changed it), and any
/// warnings the compiler attached to the command.
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub status: String,
    pub data: T,
    pub new_state: Option<WireState>,
    pub warnings: Vec<edb_protocol::annotations::Warning>,
}

impl<T> Response<T> {
    pub fn new(status: String, data: T) -> Response<T> {
        Response {
            status,
            data,
            new_state: None,
            warnings: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> Result<U, Error>) -> Result<Response<U>, Error> {
        Ok(Response {
            status: self.status,
            data: f(self.data)?,
            new_state: self.new_state,
            warnings: self.warnings,
        })
    }

    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            log::warn!("{warning}");
        }
    }
}

impl From<CommandComplete1> for Response<()> {
    fn from(complete: CommandComplete1) -> Response<()> {
        Response {
            new_state: complete.state,
            warnings: Vec::new(),
            ..Response::new(complete.status, ())
        }
    }
}

/// Drains the `Data`/`CommandComplete1` tail of a granular-flow `Execute`
/// , decoding each chunk against the output descriptor as it
/// arrives instead of buffering the whole result set up front.
pub struct ResponseStream<'a, R: QueryResult> {
    conn: &'a mut Connection,
    state: R::State,
    guard: Option<Guard>,
    pub status: Option<String>,
    pub new_state: Option<WireState>,
    pub warnings: Vec<edb_protocol::annotations::Warning>,
}

impl<'a, R: QueryResult> ResponseStream<'a, R> {
    pub(crate) async fn new(
        conn: &'a mut Connection,
        out_desc: &Typedesc,
        guard: Guard,
    ) -> Result<ResponseStream<'a, R>, Error> {
        let state = match out_desc.root_pos() {
            Some(root_pos) => {
                let ctx = out_desc.as_queryable_context();
                R::prepare(&ctx, root_pos)?
            }
            None => return Err(ProtocolOutOfOrderError::with_message("no output shape")),
        };
        Ok(ResponseStream {
            conn,
            state,
            guard: Some(guard),
            status: None,
            new_state: None,
            warnings: Vec::new(),
        })
    }

    /// Reads and decodes the next row, or `None` once `CommandComplete` has
    /// been seen and the connection is `ReadyForCommand` again.
    pub async fn next(&mut self) -> Result<Option<R>, Error> {
        loop {
            if self.guard.is_none() {
                return Ok(None);
            }
            let msg = self.conn.message().await?;
            match msg {
                ServerMessage::Data(Data { data }) => {
                    if let Some(chunk) = data.into_iter().next() {
                        return Ok(Some(R::decode(&mut self.state, &chunk)?));
                    }
                }
                ServerMessage::StateDataDescription(d) => {
                    self.conn.state_desc = d.typedesc;
                }
                ServerMessage::CommandDataDescription1(desc) => {
                    self.warnings
                        .extend(edb_protocol::annotations::decode_warnings(&desc.annotations)?);
                    let output = desc.output().map_err(ProtocolEncodingError::with_source)?;
                    if let Some(root_pos) = output.root_pos() {
                        let ctx = output.as_queryable_context();
                        self.state = R::prepare(&ctx, root_pos)?;
                    }
                }
                ServerMessage::CommandComplete1(complete) => {
                    self.status = Some(complete.status);
                    self.new_state = complete.state;
                    let guard = self.guard.take().unwrap();
                    self.conn.expect_ready(guard).await?;
                    return Ok(None);
                }
                ServerMessage::ErrorResponse(err) => {
                    let guard = self.guard.take().unwrap();
                    self.conn
                        .expect_ready_or_eos(guard)
                        .await
                        .map_err(|e| log::warn!("Error waiting for Ready after error: {e:#}"))
                        .ok();
                    return Err(err.into());
                }
                other => {
                    return Err(ProtocolOutOfOrderError::with_message(format!(
                        "Unsolicited message {other:?}"
                    )));
                }
            }
        }
    }

    /// Reads and decodes every remaining row, consuming the stream.
    pub async fn collect(mut self) -> Result<Vec<R>, Error> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }

    /// Like [`Self::collect`], but keeps the status string and updated
    /// session state the drained `CommandComplete` carried, for callers that
    /// need them.
    pub async fn collect_response(mut self) -> Result<Response<Vec<R>>, Error> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        let mut response = Response::new(self.status.take().unwrap_or_default(), out);
        response.new_state = self.new_state.take();
        response.warnings = std::mem::take(&mut self.warnings);
        Ok(response)
    }
}

/// A connection checked out of [`crate::pool::Pool`]: the same [`Connection`]
/// API, minus the ability to drop it without the pool noticing.
pub struct PoolConnection {
    pub(crate) inner: Option<Connection>,
    pub(crate) release: Option<tokio::sync::mpsc::UnboundedSender<Connection>>,
}

impl PoolConnection {
    pub(crate) fn new(
        inner: Connection,
        release: tokio::sync::mpsc::UnboundedSender<Connection>,
    ) -> PoolConnection {
        PoolConnection {
            inner: Some(inner),
            release: Some(release),
        }
    }

    pub fn inner(&mut self) -> &mut Connection {
        self.inner.as_mut().expect("connection is not dropped")
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        if let (Some(conn), Some(release)) = (self.inner.take(), self.release.take()) {
            let _ = release.send(conn);
        }
    }
}
