//! Client-side SASL/SCRAM-SHA-256 state machine for the wire protocol
//! handshake. The server side of this exchange, and mechanisms
//! other than SCRAM-SHA-256, are out of scope: a client driver only ever
//! plays the SASL client role.

pub mod handshake;
pub mod scram;

/// Authentication mechanism a connection negotiated or was told to use.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub enum AuthType {
    /// The server accepted the connection outright (`AuthenticationOk`
    /// with no SASL exchange).
    #[default]
    Trust,
    /// SCRAM-SHA-256, the only SASL mechanism Gel's wire protocol offers.
    ScramSha256,
}

impl AuthType {
    /// Picks the mechanism this crate supports from the server's announced
    /// list, preferring `SCRAM-SHA-256`. `None` if the server requires
    /// something this crate cannot do.
    pub fn negotiate(methods: &[String]) -> Option<AuthType> {
        if methods.iter().any(|m| m == "SCRAM-SHA-256") {
            Some(AuthType::ScramSha256)
        } else {
            None
        }
    }
}
