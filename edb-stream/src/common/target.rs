//! Addressing: where a stream connects to or is bound on, resolved or not,
//! plus the small traits streams implement to describe themselves.

use std::borrow::Cow;
use std::fmt;
use std::net::SocketAddr;

use crate::common::tls::TlsParameters;

/// A socket address that has already been resolved to something connectable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    SocketAddr(SocketAddr),
    #[cfg(unix)]
    UnixSocketAddr(std::os::unix::net::SocketAddr),
}

impl ResolvedTarget {
    pub fn is_tcp(&self) -> bool {
        matches!(self, ResolvedTarget::SocketAddr(_))
    }
}

impl From<SocketAddr> for ResolvedTarget {
    fn from(addr: SocketAddr) -> Self {
        ResolvedTarget::SocketAddr(addr)
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::SocketAddr> for ResolvedTarget {
    fn from(addr: std::os::unix::net::SocketAddr) -> Self {
        ResolvedTarget::UnixSocketAddr(addr)
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedTarget::SocketAddr(addr) => write!(f, "{addr}"),
            #[cfg(unix)]
            ResolvedTarget::UnixSocketAddr(addr) => write!(f, "{addr:?}"),
        }
    }
}

/// A socket address that may or may not have been resolved yet: a bare
/// `(host, port)` pair waiting on a [`super::resolver::Resolver`], or
/// something already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaybeResolvedTarget {
    Resolved(ResolvedTarget),
    Unresolved(Cow<'static, str>, u16, Option<Cow<'static, str>>),
}

impl From<SocketAddr> for MaybeResolvedTarget {
    fn from(addr: SocketAddr) -> Self {
        MaybeResolvedTarget::Resolved(ResolvedTarget::SocketAddr(addr))
    }
}

impl From<ResolvedTarget> for MaybeResolvedTarget {
    fn from(target: ResolvedTarget) -> Self {
        MaybeResolvedTarget::Resolved(target)
    }
}

impl From<(&'static str, u16)> for MaybeResolvedTarget {
    fn from((host, port): (&'static str, u16)) -> Self {
        MaybeResolvedTarget::Unresolved(Cow::Borrowed(host), port, None)
    }
}

impl From<(String, u16)> for MaybeResolvedTarget {
    fn from((host, port): (String, u16)) -> Self {
        MaybeResolvedTarget::Unresolved(Cow::Owned(host), port, None)
    }
}

/// Marker trait for things that can be resolved to a TCP endpoint, blanket
/// bridging into [`super::resolver::Resolvable`].
pub trait TcpResolve: Into<MaybeResolvedTarget> {}

impl<T: Into<MaybeResolvedTarget>> TcpResolve for T {}

/// A named endpoint: a hostname/port pair or an already-resolved address,
/// carrying whatever a [`super::resolver::Resolver`] needs to turn it into a
/// [`ResolvedTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetName {
    resolved: MaybeResolvedTarget,
}

impl TargetName {
    pub fn new_tcp(addr: impl Into<MaybeResolvedTarget>) -> Self {
        TargetName { resolved: addr.into() }
    }

    pub fn new_resolved(target: ResolvedTarget) -> Self {
        TargetName { resolved: MaybeResolvedTarget::Resolved(target) }
    }

    pub fn maybe_resolved(&self) -> &MaybeResolvedTarget {
        &self.resolved
    }

    /// The hostname to present for SNI/certificate verification, if known.
    pub fn host(&self) -> Cow<'_, str> {
        match &self.resolved {
            MaybeResolvedTarget::Unresolved(host, _, sni) => {
                sni.clone().unwrap_or_else(|| host.clone())
            }
            MaybeResolvedTarget::Resolved(resolved) => Cow::Owned(resolved.to_string()),
        }
    }
}

/// A connection target: an address plus the TLS configuration (if any) that
/// should be negotiated once connected.
#[derive(Debug, Clone)]
pub struct Target {
    name: TargetName,
    tls: Option<TlsParameters>,
    starttls: bool,
}

impl Target {
    pub fn new(name: TargetName) -> Target {
        Target { name, tls: None, starttls: false }
    }

    pub fn new_tls(name: TargetName, tls: TlsParameters) -> Target {
        Target { name, tls: Some(tls), starttls: false }
    }

    pub fn new_starttls(name: TargetName, tls: TlsParameters) -> Target {
        Target { name, tls: Some(tls), starttls: true }
    }

    pub fn new_resolved(addr: ResolvedTarget) -> Target {
        Target::new(TargetName::new_resolved(addr))
    }

    pub fn new_resolved_tls(addr: ResolvedTarget, tls: TlsParameters) -> Target {
        Target::new_tls(TargetName::new_resolved(addr), tls)
    }

    pub fn new_resolved_starttls(addr: ResolvedTarget, tls: TlsParameters) -> Target {
        Target::new_starttls(TargetName::new_resolved(addr), tls)
    }

    pub(crate) fn maybe_resolved(&self) -> &MaybeResolvedTarget {
        self.name.maybe_resolved()
    }

    pub(crate) fn maybe_ssl(&self) -> Option<&TlsParameters> {
        self.tls.as_ref()
    }

    pub(crate) fn is_starttls(&self) -> bool {
        self.starttls
    }

    pub(crate) fn name(&self) -> Cow<'_, str> {
        self.name.host()
    }
}

/// What kind of transport a stream is layered over, independent of whether
/// TLS has been negotiated on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Unix,
}

/// Implemented by streams that know the local address they are bound to.
pub trait LocalAddress {
    fn local_address(&self) -> std::io::Result<ResolvedTarget>;
}

/// Implemented by streams that know the remote address they are connected to.
pub trait RemoteAddress {
    fn remote_address(&self) -> std::io::Result<ResolvedTarget>;
}

/// Implemented by streams that can report their transport kind.
pub trait StreamMetadata {
    fn transport(&self) -> Transport;
}

/// Implemented by unix-domain streams that can report the peer's credentials.
/// The default is a no-op for transports that do not support it.
pub trait PeerCred {
    #[cfg(all(unix, feature = "tokio"))]
    fn peer_cred(&self) -> std::io::Result<tokio::net::unix::UCred> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "peer credentials not supported on this stream",
        ))
    }
}
