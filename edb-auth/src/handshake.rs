//! Glues `AuthType` negotiation to the [`crate::scram`] state machine,
//! giving `edb-client`'s raw connection a single type to drive across the
//! `Authentication*` message sequence.

use crate::scram::{SCRAMError, ScramAuth};
use crate::AuthType;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ClientAuthError {
    #[display("server requires an unsupported authentication method")]
    UnsupportedMethod,
    #[display("SCRAM error: {_0}")]
    Scram(SCRAMError),
    #[display("authentication message received out of order")]
    OutOfOrder,
}

enum State {
    NotStarted,
    WaitingForFirst(ScramAuth),
    WaitingForFinal(ScramAuth),
    Done,
}

/// Drives one client-side authentication attempt across the
/// `AuthenticationSASL*`/`AuthenticationOk` message sequence.
pub struct ClientAuth {
    username: String,
    password: String,
    state: State,
}

impl ClientAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> ClientAuth {
        ClientAuth {
            username: username.into(),
            password: password.into(),
            state: State::NotStarted,
        }
    }

    /// Starts the exchange once the server has announced its SASL methods
    /// list (`AuthenticationRequiredSASLMessage`), returning the negotiated
    /// mechanism name and the `client-first-message` to send as the
    /// `AuthenticationSASLInitialResponse` payload.
    pub fn start(
        &mut self,
        methods: &[String],
    ) -> Result<(&'static str, Vec<u8>), ClientAuthError> {
        match AuthType::negotiate(methods) {
            Some(AuthType::ScramSha256) => {
                let mut scram = ScramAuth::new(&self.username, &self.password);
                let first = scram.client_first();
                self.state = State::WaitingForFirst(scram);
                Ok(("SCRAM-SHA-256", first))
            }
            Some(AuthType::Trust) | None => Err(ClientAuthError::UnsupportedMethod),
        }
    }

    /// Feeds the `server-first-message` from `AuthenticationSASLContinue`,
    /// returning the `client-final-message` for the follow-up
    /// `AuthenticationSASLResponse`.
    pub fn handle_server_first(&mut self, data: &[u8]) -> Result<Vec<u8>, ClientAuthError> {
        let State::WaitingForFirst(mut scram) = std::mem::replace(&mut self.state, State::Done)
        else {
            return Err(ClientAuthError::OutOfOrder);
        };
        let final_msg = scram.handle_server_first(data).map_err(ClientAuthError::Scram)?;
        self.state = State::WaitingForFinal(scram);
        Ok(final_msg)
    }

    /// Feeds the `server-final-message` from `AuthenticationSASLFinal`,
    /// completing the exchange once the server's signature checks out.
    pub fn handle_server_final(&mut self, data: &[u8]) -> Result<(), ClientAuthError> {
        let State::WaitingForFinal(mut scram) = std::mem::replace(&mut self.state, State::Done)
        else {
            return Err(ClientAuthError::OutOfOrder);
        };
        scram.handle_server_final(data).map_err(ClientAuthError::Scram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_method() {
        let mut auth = ClientAuth::new("user", "pencil");
        let err = auth.start(&["PLAIN".to_owned()]).unwrap_err();
        assert!(matches!(err, ClientAuthError::UnsupportedMethod));
    }

    #[test]
    fn out_of_order_messages_rejected() {
        let mut auth = ClientAuth::new("user", "pencil");
        let err = auth.handle_server_first(b"r=x,s=eA==,i=1").unwrap_err();
        assert!(matches!(err, ClientAuthError::OutOfOrder));
    }
}
