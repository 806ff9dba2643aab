//! Client-side SCRAM-SHA-256 (RFC 5802 / RFC 7677), the only SASL mechanism
//! the wire protocol's `AuthenticationSASL` exchange offers.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SCRAMError {
    #[display("malformed SCRAM message: {_0}")]
    InvalidMessage(#[error(not(source))] String),
    #[display("server nonce does not extend the client nonce")]
    NonceMismatch,
    #[display("server signature verification failed")]
    VerificationFailed,
    #[display("invalid base64 in SCRAM message")]
    Base64(base64::DecodeError),
    #[display("invalid UTF-8 in SCRAM message")]
    Utf8(std::str::Utf8Error),
}

fn b64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn un_b64(data: &str) -> Result<Vec<u8>, SCRAMError> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(SCRAMError::Base64)
}

/// SASLprep (RFC 4013), reduced to the normalization step actually needed
/// for passwords: no prohibited-character checking, matching what the
/// reference drivers do for simplicity.
fn sasl_prep(s: &str) -> String {
    s.nfkc().collect()
}

fn hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

fn xor(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// `Hi(password, salt, iterations)` from RFC 5802 §2.2.
fn hi(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut salted = hmac(password, &[salt, &1u32.to_be_bytes()].concat());
    let mut prev = salted;
    for _ in 1..iterations {
        prev = hmac(password, &prev);
        salted = xor(&salted, &prev);
    }
    salted
}

/// Escapes `,` and `=` per RFC 5802 §5.1 `value-safe-char` production.
fn escape_name(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

fn parse_fields(s: &str) -> std::collections::HashMap<char, String> {
    s.split(',')
        .filter_map(|part| {
            let mut it = part.splitn(2, '=');
            let key = it.next()?.chars().next()?;
            let val = it.next()?.to_owned();
            Some((key, val))
        })
        .collect()
}

/// Drives one client-side SCRAM-SHA-256 exchange. Constructed fresh per
/// connection attempt; `client_first`, then `handle_server_first`, then
/// `handle_server_final`, each called exactly once and in order.
pub struct ScramAuth {
    username: String,
    password: String,
    client_nonce: String,
    client_first_bare: String,
    salted_password: Option<[u8; 32]>,
    auth_message: Option<String>,
}

impl ScramAuth {
    pub fn new(username: &str, password: &str) -> ScramAuth {
        let client_nonce = b64(&rand::random::<[u8; 18]>());
        ScramAuth {
            username: username.to_owned(),
            password: password.to_owned(),
            client_nonce,
            client_first_bare: String::new(),
            salted_password: None,
            auth_message: None,
        }
    }

    /// `SCRAM-SHA-256` `client-first-message`, sent as the
    /// `AuthenticationSASLInitialResponse` payload.
    pub fn client_first(&mut self) -> Vec<u8> {
        self.client_first_bare = format!(
            "n={},r={}",
            escape_name(&self.username),
            self.client_nonce
        );
        format!("n,,{}", self.client_first_bare).into_bytes()
    }

    /// Consumes the `server-first-message` from `AuthenticationSASLContinue`
    /// and returns the `client-final-message` for the follow-up
    /// `AuthenticationSASLResponse`.
    pub fn handle_server_first(&mut self, data: &[u8]) -> Result<Vec<u8>, SCRAMError> {
        let text = std::str::from_utf8(data).map_err(SCRAMError::Utf8)?;
        let fields = parse_fields(text);

        let server_nonce = fields
            .get(&'r')
            .ok_or_else(|| SCRAMError::InvalidMessage("missing r=".into()))?;
        if !server_nonce.starts_with(&self.client_nonce) {
            return Err(SCRAMError::NonceMismatch);
        }
        let salt = fields
            .get(&'s')
            .ok_or_else(|| SCRAMError::InvalidMessage("missing s=".into()))?;
        let salt = un_b64(salt)?;
        let iterations: u32 = fields
            .get(&'i')
            .ok_or_else(|| SCRAMError::InvalidMessage("missing i=".into()))?
            .parse()
            .map_err(|_| SCRAMError::InvalidMessage("non-numeric i=".into()))?;

        let normalized_password = sasl_prep(&self.password);
        let salted_password = hi(normalized_password.as_bytes(), &salt, iterations);
        self.salted_password = Some(salted_password);

        let channel_binding = b64(b"n,,");
        let client_final_without_proof = format!("c={channel_binding},r={server_nonce}");
        let auth_message = format!("{},{},{}", self.client_first_bare, text, client_final_without_proof);

        let client_key = hmac(&salted_password, b"Client Key");
        let stored_key = sha256(&client_key);
        let client_signature = hmac(&stored_key, auth_message.as_bytes());
        let client_proof = xor(&client_key, &client_signature);

        self.auth_message = Some(auth_message.clone());

        Ok(format!("{client_final_without_proof},p={}", b64(&client_proof)).into_bytes())
    }

    /// Consumes the `server-final-message` from `AuthenticationSASLFinal`
    /// and verifies the server's signature, proving it knows the stored key
    /// without either side having sent the password in the clear.
    pub fn handle_server_final(&mut self, data: &[u8]) -> Result<(), SCRAMError> {
        let text = std::str::from_utf8(data).map_err(SCRAMError::Utf8)?;
        let fields = parse_fields(text);
        let received_sig = fields
            .get(&'v')
            .ok_or_else(|| SCRAMError::InvalidMessage("missing v=".into()))?;
        let received_sig = un_b64(received_sig)?;

        let salted_password = self
            .salted_password
            .ok_or_else(|| SCRAMError::InvalidMessage("handle_server_first not called".into()))?;
        let auth_message = self
            .auth_message
            .clone()
            .ok_or_else(|| SCRAMError::InvalidMessage("handle_server_first not called".into()))?;

        let server_key = hmac(&salted_password, b"Server Key");
        let server_signature = hmac(&server_key, auth_message.as_bytes());

        if !constant_time_eq::constant_time_eq(&server_signature, &received_sig) {
            return Err(SCRAMError::VerificationFailed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drives a full exchange against a server side computed with the same
    /// primitives, checking the client accepts a correctly derived
    /// server signature and produces the expected client-final fields.
    #[test]
    fn full_exchange_round_trip() {
        let username = "user";
        let password = "pencil";
        let salt = [7u8; 16];
        let iterations = 4096u32;

        let mut client = ScramAuth::new(username, password);
        let first = String::from_utf8(client.client_first()).unwrap();
        assert_eq!(first, format!("n,,n={username},r={}", client.client_nonce));

        let server_nonce = format!("{}SERVERPART", client.client_nonce);
        let server_first = format!("r={server_nonce},s={},i={iterations}", b64(&salt));
        let final_msg = client.handle_server_first(server_first.as_bytes()).unwrap();
        let final_msg = String::from_utf8(final_msg).unwrap();

        let channel_binding = b64(b"n,,");
        assert!(final_msg.starts_with(&format!("c={channel_binding},r={server_nonce}")));
        assert!(final_msg.contains(",p="));

        // Recompute the expected server signature the same way a real
        // server would, and confirm the client accepts it.
        let salted_password = hi(&sasl_prep(password).into_bytes(), &salt, iterations);
        let auth_message = client.auth_message.clone().unwrap();
        let server_key = hmac(&salted_password, b"Server Key");
        let server_signature = hmac(&server_key, auth_message.as_bytes());
        let server_final = format!("v={}", b64(&server_signature));
        client.handle_server_final(server_final.as_bytes()).unwrap();
    }

    #[test]
    fn rejects_nonce_that_does_not_extend_client_nonce() {
        let mut client = ScramAuth::new("user", "pencil");
        client.client_first();
        let bogus = "r=not-the-right-nonce,s=c2FsdA==,i=4096";
        let err = client.handle_server_first(bogus.as_bytes()).unwrap_err();
        assert!(matches!(err, SCRAMError::NonceMismatch));
    }

    #[test]
    fn rejects_forged_server_signature() {
        let mut client = ScramAuth::new("user", "pencil");
        client.client_first();
        let salt = b64(&[1u8; 16]);
        let server_first = format!("r={}EXTRA,s={},i=4096", client.client_nonce, salt);
        client.handle_server_first(server_first.as_bytes()).unwrap();
        let forged = format!("v={}", b64(&[0u8; 32]));
        let err = client.handle_server_final(forged.as_bytes()).unwrap_err();
        assert!(matches!(err, SCRAMError::VerificationFailed));
    }
}
