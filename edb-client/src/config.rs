//! Connection configuration: an opaque,
//! fully-resolved bag of settings the core is handed. The core never reads
//! environment variables or config files, never parses a DSN, and never
//! looks at `~/.config` — all of that resolution happens upstream, in a
//! language binding or a higher-level crate, before a [`ConnConfig`] reaches
//! [`crate::Client::new`].

use std::time::Duration;

use edb_stream::pki_types::CertificateDer;
use edb_stream::TlsServerCertVerify;

/// Minimum number of worker connections the pool keeps available, unless the
/// server suggests a smaller figure via `suggested_pool_concurrency`.
pub const DEFAULT_POOL_CONCURRENCY: usize = 4;

/// How long an idle pool connection may sit unused before being dropped,
/// overridable per-branch by the server's `session_idle_timeout`.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ConnConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub branch: Option<String>,
    pub tls_server_name: Option<String>,
    pub tls_ca: Vec<CertificateDer<'static>>,
    pub tls_security: TlsServerCertVerify,
    pub connect_timeout: Duration,
    pub wait_until_available: Duration,
    pub max_concurrency: Option<usize>,
}

impl ConnConfig {
    /// A config pointed at `127.0.0.1:5656` with no TLS verification,
    /// suitable for tests against a local dev instance.
    pub fn new_insecure(database: impl Into<String>, password: impl Into<String>) -> ConnConfig {
        ConnConfig {
            host: "127.0.0.1".into(),
            port: 5656,
            user: "edgedb".into(),
            password: Some(password.into()),
            database: database.into(),
            branch: None,
            tls_server_name: None,
            tls_ca: Vec::new(),
            tls_security: TlsServerCertVerify::Insecure,
            connect_timeout: Duration::from_secs(10),
            wait_until_available: Duration::from_secs(30),
            max_concurrency: None,
        }
    }
}
