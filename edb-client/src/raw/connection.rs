//! One TCP/TLS socket speaking the wire protocol: connect, authenticate,
//! frame messages in and out.
//! Everything above "one socket" — reconnect, pooling, transactions — lives
//! in sibling modules.

use std::collections::HashMap;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

use edb_auth::handshake::{ClientAuth, ClientAuthError};
use edb_protocol::buffer::{Input, Output};
use edb_protocol::client_message::{
    ClientHandshake, ClientMessage, SaslInitialResponse, SaslResponse,
};
use edb_protocol::common::RawTypedesc;
use edb_protocol::descriptors::Typedesc;
use edb_protocol::enums::TransactionState;
use edb_protocol::errors::DecodeError;
use edb_protocol::features::ProtocolVersion;
use edb_protocol::server_message::{Authentication, ServerMessage};
use edb_stream::{Connector, RawStream, Ssl, Target, TargetName, TlsAlpn, TlsParameters};

use crate::caches::ConnectionCaches;
use crate::config::ConnConfig;
use crate::errors::{
    ClientConnectionClosedError, ClientConnectionEosError, ClientConnectionFailedError,
    ClientConnectionFailedTemporarilyError, Error, ErrorKind, ProtocolError,
    UnsupportedProtocolVersionError,
};

const ALPN_PROTOCOLS: &[&[u8]] = &[b"edgedb-binary", b"gel-binary"];

/// Lifecycle state of a connection, tracked so a request can never overlap
/// another on the same socket.
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// No request in flight; `idle_since` feeds the pool's idle-timeout
    /// eviction check.
    Normal { idle_since: Instant },
    /// A request is in flight on this socket.
    Dirty,
    /// Waiting on a keepalive ping before the connection can be reused.
    AwaitingPing,
}

/// One connected, authenticated protocol session.
pub struct Connection {
    socket: RawStream,
    pub(crate) proto: ProtocolVersion,
    pub(crate) mode: Mode,
    pub(crate) transaction_state: TransactionState,
    pub(crate) state_desc: Typedesc,
    pub(crate) server_params: HashMap<String, String>,
    pub(crate) suggested_pool_concurrency: Option<usize>,
    pub(crate) caches: ConnectionCaches,
}

impl Connection {
    /// Opens the socket, negotiates TLS + ALPN, and runs the
    /// `ClientHandshake`/authentication exchange through to the first
    /// `ReadyForCommand`.
    pub async fn connect(config: &ConnConfig) -> Result<Connection, Error> {
        let sni = config
            .tls_server_name
            .clone()
            .unwrap_or_else(|| config.host.clone());
        let tls = TlsParameters {
            server_cert_verify: config.tls_security,
            root_cert: if config.tls_ca.is_empty() {
                Default::default()
            } else {
                edb_stream::TlsCert::Custom(config.tls_ca.clone())
            },
            alpn: TlsAlpn::new(ALPN_PROTOCOLS),
            sni_override: Some(sni.into()),
            ..Default::default()
        };
        let target = Target::new_tls(TargetName::new_tcp((config.host.clone(), config.port)), tls);
        let connector = Connector::<Ssl>::new(target)
            .map_err(|e| ClientConnectionFailedError::with_source(e))?;
        let socket = tokio::time::timeout(config.connect_timeout, connector.connect())
            .await
            .map_err(|_| ClientConnectionFailedTemporarilyError::with_message("connect timed out"))?
            .map_err(|e| ClientConnectionFailedError::with_source(e))?;

        let mut conn = Connection {
            socket,
            proto: ProtocolVersion::current(),
            mode: Mode::Normal { idle_since: Instant::now() },
            transaction_state: TransactionState::NotInTransaction,
            state_desc: RawTypedesc::uninitialized()
                .decode()
                .expect("empty typedesc always decodes"),
            server_params: HashMap::new(),
            suggested_pool_concurrency: None,
            caches: ConnectionCaches::new(),
        };
        conn.handshake(config).await?;
        Ok(conn)
    }

    async fn handshake(&mut self, config: &ConnConfig) -> Result<(), Error> {
        let mut params = HashMap::new();
        params.insert("user".to_owned(), config.user.clone());
        params.insert("database".to_owned(), config.database.clone());
        if let Some(branch) = &config.branch {
            params.insert("branch".to_owned(), branch.clone());
        }
        self.send_messages(&[ClientMessage::ClientHandshake(ClientHandshake {
            major_ver: self.proto.version_tuple().0,
            minor_ver: self.proto.version_tuple().1,
            params,
            extensions: HashMap::new(),
        })])
        .await?;

        let mut auth = ClientAuth::new(&config.user, config.password.as_deref().unwrap_or(""));
        loop {
            let msg = self.message().await?;
            match msg {
                ServerMessage::ServerHandshake(handshake) => {
                    let negotiated = ProtocolVersion::new(handshake.major_ver, handshake.minor_ver);
                    if !negotiated.is_supported() {
                        return Err(UnsupportedProtocolVersionError::with_message(format!(
                            "server only supports protocol {negotiated:?}"
                        )));
                    }
                    self.proto = negotiated;
                }
                ServerMessage::Authentication(Authentication::Ok) => {}
                ServerMessage::Authentication(Authentication::Sasl { methods }) => {
                    let (method, data) = auth
                        .start(&methods)
                        .map_err(Self::auth_error)?;
                    self.send_messages(&[ClientMessage::AuthenticationSaslInitialResponse(
                        SaslInitialResponse { method: method.to_owned(), data: data.into() },
                    )])
                    .await?;
                }
                ServerMessage::Authentication(Authentication::SaslContinue { data }) => {
                    let reply = auth.handle_server_first(&data).map_err(Self::auth_error)?;
                    self.send_messages(&[ClientMessage::AuthenticationSaslResponse(
                        SaslResponse { data: reply.into() },
                    )])
                    .await?;
                }
                ServerMessage::Authentication(Authentication::SaslFinal { data }) => {
                    auth.handle_server_final(&data).map_err(Self::auth_error)?;
                }
                ServerMessage::ServerKeyData(_) => {}
                ServerMessage::ParameterStatus(status) => {
                    if status.name == "suggested_pool_concurrency" {
                        if let Ok(text) = std::str::from_utf8(&status.value) {
                            self.suggested_pool_concurrency = text.parse().ok();
                        }
                    }
                    self.server_params.insert(
                        status.name.clone(),
                        String::from_utf8_lossy(&status.value).into_owned(),
                    );
                }
                ServerMessage::ReadyForCommand(ready) => {
                    self.transaction_state = ready.transaction_state;
                    return Ok(());
                }
                ServerMessage::ErrorResponse(err) => return Err(err.into()),
                other => {
                    return Err(ProtocolError::with_message(format!(
                        "unexpected message during handshake: {other:?}"
                    )));
                }
            }
        }
    }

    fn auth_error(err: ClientAuthError) -> Error {
        ClientConnectionFailedError::with_source(err)
    }

    /// True if the socket itself is usable for another request — i.e. we are
    /// not mid-request.
    pub fn is_consistent(&self) -> bool {
        matches!(self.mode, Mode::Normal { .. })
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.transaction_state
    }

    pub fn suggested_pool_concurrency(&self) -> Option<usize> {
        self.suggested_pool_concurrency
    }

    /// The server-advertised idle-connection timeout, if this branch's
    /// config sent one during the handshake.
    pub fn session_idle_timeout(&self) -> Option<std::time::Duration> {
        let raw = self.server_params.get("session_idle_timeout")?;
        raw.parse::<f64>().ok().map(std::time::Duration::from_secs_f64)
    }

    /// How long the connection has been idle, if it is currently idle.
    pub fn idle_for(&self) -> Option<std::time::Duration> {
        match self.mode {
            Mode::Normal { idle_since } => Some(idle_since.elapsed()),
            _ => None,
        }
    }

    pub(crate) async fn send_messages(&mut self, messages: &[ClientMessage]) -> Result<(), Error> {
        let mut out = Output::new(self.proto);
        for msg in messages {
            msg.encode(&mut out)
                .map_err(|e| ClientConnectionFailedError::with_source(e))?;
        }
        let bytes = out.send();
        self.socket
            .write_all(&bytes)
            .await
            .map_err(Self::io_error)?;
        self.socket.flush().await.map_err(Self::io_error)?;
        Ok(())
    }

    /// Reads and decodes exactly one frame: a 1-byte message type, a 4-byte
    /// big-endian length (counting itself), then `length - 4` payload bytes.
    pub(crate) async fn message(&mut self) -> Result<ServerMessage, Error> {
        let type_byte = match self.socket.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ClientConnectionEosError::with_message("connection closed by server"));
            }
            Err(e) => return Err(Self::io_error(e)),
        };
        let length = self.socket.read_u32().await.map_err(Self::io_error)?;
        let mut payload = BytesMut::zeroed(length as usize - 4);
        self.socket.read_exact(&mut payload).await.map_err(Self::io_error)?;

        let mut input = Input::new(self.proto, payload.freeze());
        let msg = ServerMessage::decode(type_byte, &mut input).map_err(Self::decode_error)?;
        if !input.is_empty() {
            return Err(ProtocolError::with_message("trailing bytes in frame"));
        }
        Ok(msg)
    }

    fn io_error(e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ClientConnectionEosError::with_source(e)
        } else {
            ClientConnectionClosedError::with_source(e)
        }
    }

    fn decode_error(e: DecodeError) -> Error {
        ProtocolError::with_source(e)
    }

    pub async fn close(mut self) {
        let _ = self.send_messages(&[ClientMessage::Terminate]).await;
        let _ = self.socket.shutdown().await;
    }
}
