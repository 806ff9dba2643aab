//! The buffer codec: a pure, transport-agnostic writer and
//! reader over byte cursors, exposed through `encoding` as `Output`/`Input`.
//! Socket I/O is a concern of `edb-client`'s framed connection, not this
//! crate.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::errors::{self, DecodeError, EncodeError};
use crate::features::ProtocolVersion;

/// A value that can append itself to an [`Output`].
pub trait Encode {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError>;
}

/// A value that can read itself off an [`Input`].
pub trait Decode: Sized {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError>;
}

impl Encode for String {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_str(self)
    }
}

impl Encode for str {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_str(self)
    }
}

impl Decode for String {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        buf.pop_string()
    }
}

impl Encode for Bytes {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_bytes(self)
    }
}

impl Decode for Bytes {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        buf.pop_bytes()
    }
}

impl Encode for Uuid {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_uuid(*self);
        Ok(())
    }
}

impl Decode for Uuid {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        buf.pop_uuid()
    }
}

/// Write a full `type_byte, length, body` message frame by encoding `body`
/// between `begin_message`/`end_message`.
pub fn encode(buf: &mut Output, type_byte: u8, body: &dyn Encode) -> Result<(), EncodeError> {
    buf.begin_message(type_byte);
    body.encode(buf)?;
    buf.end_message()
}

/// An in-progress length-prefixed message or nested byte segment.
struct OpenFrame {
    /// Byte offset of the 4-byte length placeholder.
    length_at: usize,
}

/// Accumulates outbound bytes for one or more wire messages.
///
/// At most one message and at most one nested `begin_bytes`/`end_bytes` may
/// be open at a time; violating that is a programmer error and panics, same
/// as the `debug_assert!`-guarded invariants elsewhere in the codec.
pub struct Output {
    proto: ProtocolVersion,
    buf: BytesMut,
    message: Option<OpenFrame>,
    nested: Option<OpenFrame>,
}

impl Output {
    pub fn new(proto: ProtocolVersion) -> Output {
        Output {
            proto,
            buf: BytesMut::new(),
            message: None,
            nested: None,
        }
    }

    pub fn proto(&self) -> &ProtocolVersion {
        &self.proto
    }

    pub fn reserve(&mut self, n: usize) {
        self.buf.reserve(n);
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }
    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }
    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }
    pub fn put_i16(&mut self, v: i16) {
        self.buf.put_i16(v);
    }
    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }
    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }
    pub fn put_f32(&mut self, v: f32) {
        self.buf.put_f32(v);
    }
    pub fn put_f64(&mut self, v: f64) {
        self.buf.put_f64(v);
    }

    pub fn put_uuid(&mut self, id: Uuid) {
        self.buf.extend_from_slice(id.as_bytes());
    }

    /// Length-prefixed (`u32` byte length) raw bytes.
    pub fn put_bytes(&mut self, data: &[u8]) -> Result<(), EncodeError> {
        let len = u32::try_from(data.len()).ok().ok_or_else(|| {
            errors::ElementTooLong.build()
        })?;
        self.buf.reserve(4 + data.len());
        self.buf.put_u32(len);
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Length-prefixed UTF-8 string.
    pub fn put_str(&mut self, s: &str) -> Result<(), EncodeError> {
        self.put_bytes(s.as_bytes())
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Begin a `type_byte, length:u32 (placeholder), ...` message frame.
    pub fn begin_message(&mut self, type_byte: u8) {
        assert!(self.message.is_none(), "message already in progress");
        self.buf.put_u8(type_byte);
        let length_at = self.buf.len();
        self.buf.put_u32(0);
        self.message = Some(OpenFrame { length_at });
    }

    /// Backfill the length placeholder opened by `begin_message`.
    pub fn end_message(&mut self) -> Result<(), EncodeError> {
        let frame = self.message.take().expect("end_message without begin_message");
        self.backfill_length(frame)
    }

    /// Begin a nested length-prefixed segment (no type byte), used for
    /// inner descriptor/value blobs embedded in a larger message.
    pub fn begin_bytes(&mut self) {
        assert!(self.nested.is_none(), "nested bytes already in progress");
        let length_at = self.buf.len();
        self.buf.put_u32(0);
        self.nested = Some(OpenFrame { length_at });
    }

    pub fn end_bytes(&mut self) -> Result<(), EncodeError> {
        let frame = self.nested.take().expect("end_bytes without begin_bytes");
        self.backfill_length(frame)
    }

    fn backfill_length(&mut self, frame: OpenFrame) -> Result<(), EncodeError> {
        let total = self.buf.len() - frame.length_at;
        let total = u32::try_from(total).ok().ok_or_else(|| errors::MessageTooLong.build())?;
        self.buf[frame.length_at..frame.length_at + 4].copy_from_slice(&total.to_be_bytes());
        Ok(())
    }

    /// Drain accumulated bytes for the caller to flush to the socket.
    /// Asserts no message/nested segment is left open.
    pub fn send(&mut self) -> Bytes {
        assert!(self.message.is_none(), "message still in progress at send()");
        assert!(self.nested.is_none(), "nested bytes still in progress at send()");
        self.buf.split().freeze()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// A cursor over one message's payload (or a standalone byte blob), with
/// scalar pop operations mirroring [`Output`]'s push operations.
pub struct Input {
    proto: ProtocolVersion,
    buf: Bytes,
}

impl Input {
    pub fn new(proto: ProtocolVersion, buf: Bytes) -> Input {
        Input { proto, buf }
    }

    pub fn proto(&self) -> &ProtocolVersion {
        &self.proto
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    fn ensure(&self, n: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < n {
            return errors::Underflow.fail();
        }
        Ok(())
    }

    pub fn pop_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }
    pub fn pop_u16(&mut self) -> Result<u16, DecodeError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }
    pub fn pop_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }
    pub fn pop_u64(&mut self) -> Result<u64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }
    pub fn pop_i16(&mut self) -> Result<i16, DecodeError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16())
    }
    pub fn pop_i32(&mut self) -> Result<i32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }
    pub fn pop_i64(&mut self) -> Result<i64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }
    pub fn pop_f32(&mut self) -> Result<f32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }
    pub fn pop_f64(&mut self) -> Result<f64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    pub fn pop_uuid(&mut self) -> Result<Uuid, DecodeError> {
        self.ensure(16)?;
        let mut bytes = [0u8; 16];
        self.buf.copy_to_slice(&mut bytes);
        Ok(Uuid::from_bytes(bytes))
    }

    /// Pop exactly `n` bytes.
    pub fn pop_slice(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        self.ensure(n)?;
        Ok(self.buf.copy_to_bytes(n))
    }

    /// Pop a `u32`-length-prefixed byte blob.
    pub fn pop_bytes(&mut self) -> Result<Bytes, DecodeError> {
        let len = self.pop_u32()? as usize;
        self.pop_slice(len)
    }

    /// Pop a `u32`-length-prefixed UTF-8 string.
    pub fn pop_string(&mut self) -> Result<String, DecodeError> {
        let raw = self.pop_bytes()?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| errors::InvalidUtf8.into_error(e.utf8_error()))
    }

    pub fn take_rest(&mut self) -> Bytes {
        self.buf.copy_to_bytes(self.buf.remaining())
    }
}

use snafu::IntoError;
