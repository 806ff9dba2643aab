/*!
The [ClientMessage] enum and related types.

```rust,ignore
pub enum ClientMessage {
    ClientHandshake(ClientHandshake),
    ExecuteScript(ExecuteScript),
    Prepare(Prepare),
    Parse(Parse),
    DescribeStatement(DescribeStatement),
    Execute0(Execute0),
    Execute1(Execute1),
    OptimisticExecute(OptimisticExecute),
    UnknownMessage(u8, Bytes),
    AuthenticationSaslInitialResponse(SaslInitialResponse),
    AuthenticationSaslResponse(SaslResponse),
    Dump2(Dump2),
    Dump3(Dump3),
    Restore(Restore),
    RestoreBlock(RestoreBlock),
    RestoreEof,
    Sync,
    Flush,
    Terminate,
}
```
*/

use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Arc;

use bytes::Bytes;
use snafu::OptionExt;
use uuid::Uuid;

pub use crate::annotations::{Annotations, KeyValues};
pub use crate::common::DumpFlags;
pub use crate::common::{Capabilities, CompilationFlags, CompilationOptions};
pub use crate::common::{RawTypedesc, State};
pub use crate::enums::{Cardinality, DescribeAspect, InputLanguage, IoFormat};

use crate::buffer::{encode, Decode, Encode, Input, Output};
use crate::errors::{self, DecodeError, EncodeError};

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClientMessage {
    AuthenticationSaslInitialResponse(SaslInitialResponse),
    AuthenticationSaslResponse(SaslResponse),
    ClientHandshake(ClientHandshake),
    Dump2(Dump2),
    Dump3(Dump3),
    Parse(Parse), // protocol >= 1.0
    ExecuteScript(ExecuteScript),
    Execute0(Execute0),
    Execute1(Execute1),
    Restore(Restore),
    RestoreBlock(RestoreBlock),
    RestoreEof,
    Sync,
    Terminate,
    Prepare(Prepare), // protocol < 1.0
    DescribeStatement(DescribeStatement),
    OptimisticExecute(OptimisticExecute),
    UnknownMessage(u8, Bytes),
    Flush,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslInitialResponse {
    pub method: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslResponse {
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHandshake {
    pub major_ver: u16,
    pub minor_ver: u16,
    pub params: HashMap<String, String>,
    pub extensions: HashMap<String, Annotations>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteScript {
    pub headers: KeyValues,
    pub script_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepare {
    pub headers: KeyValues,
    pub io_format: IoFormat,
    pub expected_cardinality: Cardinality,
    pub statement_name: Bytes,
    pub command_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parse {
    pub annotations: Option<Arc<Annotations>>,
    pub allowed_capabilities: Capabilities,
    pub compilation_flags: CompilationFlags,
    pub implicit_limit: Option<u64>,
    pub output_format: IoFormat,
    pub expected_cardinality: Cardinality,
    pub command_text: String,
    pub state: State,
    pub input_language: InputLanguage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeStatement {
    pub headers: KeyValues,
    pub aspect: DescribeAspect,
    pub statement_name: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute0 {
    pub headers: KeyValues,
    pub statement_name: Bytes,
    pub arguments: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execute1 {
    pub annotations: Option<Arc<Annotations>>,
    pub allowed_capabilities: Capabilities,
    pub compilation_flags: CompilationFlags,
    pub implicit_limit: Option<u64>,
    pub output_format: IoFormat,
    pub expected_cardinality: Cardinality,
    pub command_text: String,
    pub state: State,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
    pub arguments: Bytes,
    pub input_language: InputLanguage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticExecute {
    pub headers: KeyValues,
    pub io_format: IoFormat,
    pub expected_cardinality: Cardinality,
    pub command_text: String,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
    pub arguments: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dump2 {
    pub headers: KeyValues,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dump3 {
    pub annotations: Option<Arc<Annotations>>,
    pub flags: DumpFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restore {
    pub headers: KeyValues,
    pub jobs: u16,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreBlock {
    pub data: Bytes,
}

struct Empty;

impl ClientMessage {
    pub fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        use ClientMessage::*;
        match self {
            ClientHandshake(h) => encode(buf, 0x56, h),
            AuthenticationSaslInitialResponse(h) => encode(buf, 0x70, h),
            AuthenticationSaslResponse(h) => encode(buf, 0x72, h),
            ExecuteScript(h) => encode(buf, 0x51, h),
            Prepare(h) => encode(buf, 0x50, h),
            Parse(h) => encode(buf, 0x50, h),
            DescribeStatement(h) => encode(buf, 0x44, h),
            Execute0(h) => encode(buf, 0x45, h),
            OptimisticExecute(h) => encode(buf, 0x4f, h),
            Execute1(h) => encode(buf, 0x4f, h),
            Dump2(h) => encode(buf, 0x3e, h),
            Dump3(h) => encode(buf, 0x3e, h),
            Restore(h) => encode(buf, 0x3c, h),
            RestoreBlock(h) => encode(buf, 0x3d, h),
            RestoreEof => encode(buf, 0x2e, &Empty),
            Sync => encode(buf, 0x53, &Empty),
            Flush => encode(buf, 0x48, &Empty),
            Terminate => encode(buf, 0x58, &Empty),

            UnknownMessage(_, _) => errors::UnknownMessageCantBeEncoded.fail()?,
        }
    }

    /// Decode one frame: `type_byte` has already been peeked by the caller,
    /// `buf` is positioned right after the 4-byte length.
    pub fn decode(type_byte: u8, buf: &mut Input) -> Result<ClientMessage, DecodeError> {
        use self::ClientMessage as M;
        let result = match type_byte {
            0x56 => ClientHandshake::decode(buf).map(M::ClientHandshake)?,
            0x70 => SaslInitialResponse::decode(buf).map(M::AuthenticationSaslInitialResponse)?,
            0x72 => SaslResponse::decode(buf).map(M::AuthenticationSaslResponse)?,
            0x51 => ExecuteScript::decode(buf).map(M::ExecuteScript)?,
            0x50 => {
                if buf.proto().is_1() {
                    Parse::decode(buf).map(M::Parse)?
                } else {
                    Prepare::decode(buf).map(M::Prepare)?
                }
            }
            0x45 => Execute0::decode(buf).map(M::Execute0)?,
            0x4f => {
                if buf.proto().is_1() {
                    Execute1::decode(buf).map(M::Execute1)?
                } else {
                    OptimisticExecute::decode(buf).map(M::OptimisticExecute)?
                }
            }
            0x3e => {
                if buf.proto().is_3() {
                    Dump3::decode(buf).map(M::Dump3)?
                } else {
                    Dump2::decode(buf).map(M::Dump2)?
                }
            }
            0x3c => Restore::decode(buf).map(M::Restore)?,
            0x3d => RestoreBlock::decode(buf).map(M::RestoreBlock)?,
            0x2e => M::RestoreEof,
            0x53 => M::Sync,
            0x48 => M::Flush,
            0x58 => M::Terminate,
            0x44 => DescribeStatement::decode(buf).map(M::DescribeStatement)?,
            code => M::UnknownMessage(code, buf.take_rest()),
        };
        Ok(result)
    }
}

impl Encode for Empty {
    fn encode(&self, _buf: &mut Output) -> Result<(), EncodeError> {
        Ok(())
    }
}

fn encode_headers(buf: &mut Output, headers: &KeyValues) -> Result<(), EncodeError> {
    let count = u16::try_from(headers.len())
        .ok()
        .context(errors::TooManyHeaders)?;
    buf.put_u16(count);
    for (&name, value) in headers {
        buf.put_u16(name);
        value.encode(buf)?;
    }
    Ok(())
}

fn decode_headers(buf: &mut Input) -> Result<KeyValues, DecodeError> {
    let count = buf.pop_u16()?;
    let mut headers = HashMap::new();
    for _ in 0..count {
        let name = buf.pop_u16()?;
        let value = Bytes::decode(buf)?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn encode_annotations(buf: &mut Output, ann: Option<&Annotations>) -> Result<(), EncodeError> {
    match ann {
        Some(ann) => {
            let count = u16::try_from(ann.len())
                .ok()
                .context(errors::TooManyHeaders)?;
            buf.put_u16(count);
            for (name, value) in ann {
                name.encode(buf)?;
                value.encode(buf)?;
            }
        }
        None => buf.put_u16(0),
    }
    Ok(())
}

fn decode_annotations(buf: &mut Input) -> Result<Annotations, DecodeError> {
    let count = buf.pop_u16()?;
    let mut ann = HashMap::new();
    for _ in 0..count {
        let name = String::decode(buf)?;
        let value = String::decode(buf)?;
        ann.insert(name, value);
    }
    Ok(ann)
}

impl Encode for ClientHandshake {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_u16(self.major_ver);
        buf.put_u16(self.minor_ver);
        buf.put_u16(
            u16::try_from(self.params.len())
                .ok()
                .context(errors::TooManyParams)?,
        );
        for (k, v) in &self.params {
            k.encode(buf)?;
            v.encode(buf)?;
        }
        buf.put_u16(
            u16::try_from(self.extensions.len())
                .ok()
                .context(errors::TooManyExtensions)?,
        );
        for (name, headers) in &self.extensions {
            name.encode(buf)?;
            encode_annotations(buf, Some(headers))?;
        }
        Ok(())
    }
}

impl Decode for ClientHandshake {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let major_ver = buf.pop_u16()?;
        let minor_ver = buf.pop_u16()?;
        let params_count = buf.pop_u16()?;
        let mut params = HashMap::new();
        for _ in 0..params_count {
            let name = String::decode(buf)?;
            let value = String::decode(buf)?;
            params.insert(name, value);
        }
        let ext_count = buf.pop_u16()?;
        let mut extensions = HashMap::new();
        for _ in 0..ext_count {
            let name = String::decode(buf)?;
            let headers = decode_annotations(buf)?;
            extensions.insert(name, headers);
        }
        Ok(ClientHandshake {
            major_ver,
            minor_ver,
            params,
            extensions,
        })
    }
}

impl Encode for SaslInitialResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.method.encode(buf)?;
        self.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for SaslInitialResponse {
    fn decode(buf: &mut Input) -> Result<SaslInitialResponse, DecodeError> {
        Ok(SaslInitialResponse {
            method: String::decode(buf)?,
            data: Bytes::decode(buf)?,
        })
    }
}

impl Encode for SaslResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for SaslResponse {
    fn decode(buf: &mut Input) -> Result<SaslResponse, DecodeError> {
        Ok(SaslResponse {
            data: Bytes::decode(buf)?,
        })
    }
}

impl Encode for ExecuteScript {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(buf, &self.headers)?;
        self.script_text.encode(buf)?;
        Ok(())
    }
}

impl Decode for ExecuteScript {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let script_text = String::decode(buf)?;
        Ok(ExecuteScript {
            headers,
            script_text,
        })
    }
}

impl Encode for Prepare {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        debug_assert!(!buf.proto().is_1());
        encode_headers(buf, &self.headers)?;
        buf.put_u8(self.io_format as u8);
        buf.put_u8(self.expected_cardinality as u8);
        self.statement_name.encode(buf)?;
        self.command_text.encode(buf)?;
        Ok(())
    }
}

impl Decode for Prepare {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let io_format = IoFormat::try_from(buf.pop_u8()?)?;
        let expected_cardinality = Cardinality::try_from(buf.pop_u8()?)?;
        let statement_name = Bytes::decode(buf)?;
        let command_text = String::decode(buf)?;
        Ok(Prepare {
            headers,
            io_format,
            expected_cardinality,
            statement_name,
            command_text,
        })
    }
}

impl Encode for DescribeStatement {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(buf, &self.headers)?;
        buf.put_u8(self.aspect as u8);
        self.statement_name.encode(buf)?;
        Ok(())
    }
}

impl Decode for DescribeStatement {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let aspect = DescribeAspect::try_from(buf.pop_u8()?)?;
        let statement_name = Bytes::decode(buf)?;
        Ok(DescribeStatement {
            headers,
            aspect,
            statement_name,
        })
    }
}

impl Encode for Execute0 {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        debug_assert!(!buf.proto().is_1());
        encode_headers(buf, &self.headers)?;
        self.statement_name.encode(buf)?;
        self.arguments.encode(buf)?;
        Ok(())
    }
}

impl Decode for Execute0 {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let statement_name = Bytes::decode(buf)?;
        let arguments = Bytes::decode(buf)?;
        Ok(Execute0 {
            headers,
            statement_name,
            arguments,
        })
    }
}

impl OptimisticExecute {
    pub fn new(
        flags: &CompilationOptions,
        query: &str,
        arguments: impl Into<Bytes>,
        input_typedesc_id: Uuid,
        output_typedesc_id: Uuid,
    ) -> OptimisticExecute {
        let mut headers = KeyValues::new();
        if let Some(limit) = flags.implicit_limit {
            headers.insert(0xFF01, Bytes::from(limit.to_string()));
        }
        if flags.implicit_typenames {
            headers.insert(0xFF02, "true".into());
        }
        if flags.implicit_typeids {
            headers.insert(0xFF03, "true".into());
        }
        let caps = flags.allow_capabilities.bits().to_be_bytes();
        headers.insert(0xFF04, caps[..].to_vec().into());
        if flags.explicit_objectids {
            headers.insert(0xFF05, "true".into());
        }
        OptimisticExecute {
            headers,
            io_format: flags.io_format,
            expected_cardinality: flags.expected_cardinality,
            command_text: query.into(),
            input_typedesc_id,
            output_typedesc_id,
            arguments: arguments.into(),
        }
    }
}

impl Encode for OptimisticExecute {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(buf, &self.headers)?;
        buf.put_u8(self.io_format as u8);
        buf.put_u8(self.expected_cardinality as u8);
        self.command_text.encode(buf)?;
        self.input_typedesc_id.encode(buf)?;
        self.output_typedesc_id.encode(buf)?;
        self.arguments.encode(buf)?;
        Ok(())
    }
}

impl Decode for OptimisticExecute {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let io_format = IoFormat::try_from(buf.pop_u8()?)?;
        let expected_cardinality = Cardinality::try_from(buf.pop_u8()?)?;
        let command_text = String::decode(buf)?;
        let input_typedesc_id = Uuid::decode(buf)?;
        let output_typedesc_id = Uuid::decode(buf)?;
        let arguments = Bytes::decode(buf)?;
        Ok(OptimisticExecute {
            headers,
            io_format,
            expected_cardinality,
            command_text,
            input_typedesc_id,
            output_typedesc_id,
            arguments,
        })
    }
}

impl Encode for Execute1 {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_annotations(buf, self.annotations.as_deref())?;
        buf.put_u64(self.allowed_capabilities.bits());
        buf.put_u64(self.compilation_flags.bits());
        buf.put_u64(self.implicit_limit.unwrap_or(0));
        if buf.proto().is_multilingual() {
            buf.put_u8(self.input_language as u8);
        }
        buf.put_u8(self.output_format as u8);
        buf.put_u8(self.expected_cardinality as u8);
        self.command_text.encode(buf)?;
        self.state.typedesc_id.encode(buf)?;
        self.state.data.encode(buf)?;
        self.input_typedesc_id.encode(buf)?;
        self.output_typedesc_id.encode(buf)?;
        self.arguments.encode(buf)?;
        Ok(())
    }
}

impl Decode for Execute1 {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let annotations = decode_annotations(buf)?;
        let annotations = if annotations.is_empty() {
            None
        } else {
            Some(Arc::new(annotations))
        };
        let allowed_capabilities = decode_capabilities(buf.pop_u64()?)?;
        let compilation_flags = decode_compilation_flags(buf.pop_u64()?)?;
        let implicit_limit = match buf.pop_u64()? {
            0 => None,
            v => Some(v),
        };
        let input_language = if buf.proto().is_multilingual() {
            InputLanguage::try_from(buf.pop_u8()?)?
        } else {
            InputLanguage::EdgeQL
        };
        let output_format = IoFormat::try_from(buf.pop_u8()?)?;
        let expected_cardinality = Cardinality::try_from(buf.pop_u8()?)?;
        let command_text = String::decode(buf)?;
        let state = State {
            typedesc_id: Uuid::decode(buf)?,
            data: Bytes::decode(buf)?,
        };
        let input_typedesc_id = Uuid::decode(buf)?;
        let output_typedesc_id = Uuid::decode(buf)?;
        let arguments = Bytes::decode(buf)?;
        Ok(Execute1 {
            annotations,
            allowed_capabilities,
            compilation_flags,
            implicit_limit,
            output_format,
            expected_cardinality,
            command_text,
            state,
            input_typedesc_id,
            output_typedesc_id,
            arguments,
            input_language,
        })
    }
}

impl Encode for Dump2 {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(buf, &self.headers)
    }
}

impl Decode for Dump2 {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        Ok(Dump2 {
            headers: decode_headers(buf)?,
        })
    }
}

impl Encode for Dump3 {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_annotations(buf, self.annotations.as_deref())?;
        buf.put_u64(self.flags.bits());
        Ok(())
    }
}

impl Decode for Dump3 {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let annotations = decode_annotations(buf)?;
        let flags = decode_dump_flags(buf.pop_u64()?)?;
        Ok(Dump3 {
            annotations: Some(Arc::new(annotations)),
            flags,
        })
    }
}

impl Encode for Restore {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(buf, &self.headers)?;
        buf.put_u16(self.jobs);
        buf.extend(&self.data);
        Ok(())
    }
}

impl Decode for Restore {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let jobs = buf.pop_u16()?;
        let data = buf.take_rest();
        Ok(Restore {
            headers,
            jobs,
            data,
        })
    }
}

impl Encode for RestoreBlock {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.extend(&self.data);
        Ok(())
    }
}

impl Decode for RestoreBlock {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        Ok(RestoreBlock {
            data: buf.take_rest(),
        })
    }
}

impl Parse {
    pub fn new(
        opts: &CompilationOptions,
        query: &str,
        state: State,
        annotations: Option<Arc<Annotations>>,
    ) -> Parse {
        Parse {
            annotations,
            allowed_capabilities: opts.allow_capabilities,
            compilation_flags: opts.flags(),
            implicit_limit: opts.implicit_limit,
            output_format: opts.io_format,
            expected_cardinality: opts.expected_cardinality,
            command_text: query.into(),
            state,
            input_language: opts.input_language,
        }
    }
}

impl Prepare {
    pub fn new(flags: &CompilationOptions, query: &str) -> Prepare {
        let mut headers = KeyValues::new();
        if let Some(limit) = flags.implicit_limit {
            headers.insert(0xFF01, Bytes::from(limit.to_string()));
        }
        if flags.implicit_typenames {
            headers.insert(0xFF02, "true".into());
        }
        if flags.implicit_typeids {
            headers.insert(0xFF03, "true".into());
        }
        let caps = flags.allow_capabilities.bits().to_be_bytes();
        headers.insert(0xFF04, caps[..].to_vec().into());
        if flags.explicit_objectids {
            headers.insert(0xFF05, "true".into());
        }
        Prepare {
            headers,
            io_format: flags.io_format,
            expected_cardinality: flags.expected_cardinality,
            statement_name: Bytes::from(""),
            command_text: query.into(),
        }
    }
}

fn decode_capabilities(val: u64) -> Result<Capabilities, DecodeError> {
    Capabilities::from_bits(val)
        .ok_or_else(|| errors::InvalidCapabilities { capabilities: val }.build())
}

fn decode_compilation_flags(val: u64) -> Result<CompilationFlags, DecodeError> {
    CompilationFlags::from_bits(val).ok_or_else(|| {
        errors::InvalidCompilationFlags {
            compilation_flags: val,
        }
        .build()
    })
}

fn decode_dump_flags(val: u64) -> Result<DumpFlags, DecodeError> {
    DumpFlags::from_bits(val).ok_or_else(|| errors::InvalidDumpFlags { dump_flags: val }.build())
}

impl Decode for Parse {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let annotations = decode_annotations(buf)?;
        let annotations = if annotations.is_empty() {
            None
        } else {
            Some(Arc::new(annotations))
        };
        let allowed_capabilities = decode_capabilities(buf.pop_u64()?)?;
        let compilation_flags = decode_compilation_flags(buf.pop_u64()?)?;
        let implicit_limit = match buf.pop_u64()? {
            0 => None,
            v => Some(v),
        };
        let input_language = if buf.proto().is_multilingual() {
            InputLanguage::try_from(buf.pop_u8()?)?
        } else {
            InputLanguage::EdgeQL
        };
        let output_format = IoFormat::try_from(buf.pop_u8()?)?;
        let expected_cardinality = Cardinality::try_from(buf.pop_u8()?)?;
        let command_text = String::decode(buf)?;
        let state = State {
            typedesc_id: Uuid::decode(buf)?,
            data: Bytes::decode(buf)?,
        };
        Ok(Parse {
            annotations,
            allowed_capabilities,
            compilation_flags,
            implicit_limit,
            output_format,
            expected_cardinality,
            command_text,
            state,
            input_language,
        })
    }
}

impl Encode for Parse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        debug_assert!(buf.proto().is_1());
        encode_annotations(buf, self.annotations.as_deref())?;
        buf.put_u64(self.allowed_capabilities.bits());
        buf.put_u64(self.compilation_flags.bits());
        buf.put_u64(self.implicit_limit.unwrap_or(0));
        if buf.proto().is_multilingual() {
            buf.put_u8(self.input_language as u8);
        }
        buf.put_u8(self.output_format as u8);
        buf.put_u8(self.expected_cardinality as u8);
        self.command_text.encode(buf)?;
        self.state.typedesc_id.encode(buf)?;
        self.state.data.encode(buf)?;
        Ok(())
    }
}
