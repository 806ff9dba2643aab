//! Re-exports the shared error taxonomy and adds the pieces specific to
//! driving a connection: decoding a wire `ErrorResponse` into an [`Error`],
//! and the `Field`s a failed query attaches extra context under.

pub use edb_errors::*;

use edb_protocol::common::Capabilities;
use edb_protocol::server_message::{CommandDataDescription1, ErrorResponse};

/// Typed headers a server `ErrorResponse` carries on top of its code and
/// message. Header keys are the numeric tags the
/// wire protocol actually uses.
const HEADER_HINT: u16 = 0x0001;
const HEADER_POSITION_START: u16 = 0xFFF1;
const HEADER_POSITION_END: u16 = 0xFFF2;
const HEADER_SERVER_TRACEBACK: u16 = 0xFFFF;

impl From<ErrorResponse> for Error {
    fn from(err: ErrorResponse) -> Error {
        let mut out = Error::from_code(err.code, err.message);
        if let Some(hint) = err.attributes.get(&HEADER_HINT) {
            if let Ok(hint) = std::str::from_utf8(hint) {
                out = out.set::<fields::Hint>(hint.to_owned());
            }
        }
        if let Some(pos) = err.attributes.get(&HEADER_POSITION_START) {
            if let Ok(pos) = std::str::from_utf8(pos).unwrap_or("").parse::<u32>() {
                out = out.set::<fields::PositionStart>(pos);
            }
        }
        if let Some(pos) = err.attributes.get(&HEADER_POSITION_END) {
            if let Ok(pos) = std::str::from_utf8(pos).unwrap_or("").parse::<u32>() {
                out = out.set::<fields::PositionEnd>(pos);
            }
        }
        if let Some(tb) = err.attributes.get(&HEADER_SERVER_TRACEBACK) {
            if let Ok(tb) = std::str::from_utf8(tb) {
                out = out.set::<fields::ServerTraceback>(tb.to_owned());
            }
        }
        out
    }
}

/// The `CommandDataDescription` a failing parse/execute was compiled against,
/// attached to the error so callers can inspect the shape that was rejected.
pub struct Description;
impl Field for Description {
    type Value = CommandDataDescription1;
}

/// Whether a failed request ever reached the point of being parsed, and if
/// so, which capabilities the compiled command required.
#[derive(Debug, Clone, Copy)]
pub enum QueryCapabilities {
    Unparsed,
    Parsed(Capabilities),
}
impl Field for QueryCapabilities {
    type Value = QueryCapabilities;
}
