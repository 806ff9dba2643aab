//! Small helper types shared by client and server message bodies: the
//! `name -> value` annotation map attached to `Parse`/`Execute`/`Dump`
//! and the legacy `u16 -> Bytes` header map used by the 0.x
//! era messages.

use std::collections::HashMap;

use bytes::Bytes;
use edb_errors::{Error, ErrorKind, ProtocolEncodingError};
use serde::Deserialize;

/// `string -> string` annotation map (protocol 1.0+).
pub type Annotations = HashMap<String, String>;

/// Legacy `uint16 -> bytes` header map (protocol 0.x).
pub type KeyValues = HashMap<u16, Bytes>;

/// One entry of the `warnings` annotation: a JSON-encoded array of these
/// under the `warnings` key.
#[derive(Debug, Clone, Deserialize)]
pub struct Warning {
    pub code: u32,
    pub message: String,
    #[serde(default)]
    pub line: Option<i64>,
    #[serde(default)]
    pub col: Option<i64>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// Parses the `warnings` annotation, if present, into the list the
/// `WarningHandler` callback receives. Absent key decodes to an empty list.
pub fn decode_warnings(annotations: &Annotations) -> Result<Vec<Warning>, Error> {
    let Some(raw) = annotations.get("warnings") else {
        return Ok(Vec::new());
    };
    serde_json::from_str(raw).map_err(ProtocolEncodingError::with_source)
}
