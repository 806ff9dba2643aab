//! Fields attachable to an [`crate::Error`] via [`crate::Error::set`] /
//! [`crate::Error::get`], e.g. `edb-client/src/raw/queries.rs` attaching the
//! offending query text to a parse/execute failure.

use crate::error::Field;

pub struct QueryText;
impl Field for QueryText {
    type Value = String;
}

/// Byte offset (inclusive) into `QueryText` where the server-reported error
/// begins.
pub struct PositionStart;
impl Field for PositionStart {
    type Value = u32;
}

pub struct PositionEnd;
impl Field for PositionEnd {
    type Value = u32;
}

pub struct Hint;
impl Field for Hint {
    type Value = String;
}

pub struct ServerTraceback;
impl Field for ServerTraceback {
    type Value = String;
}
