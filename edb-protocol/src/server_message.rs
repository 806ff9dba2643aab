/*!
The [ServerMessage] enum and related types.

```rust,ignore
pub enum ServerMessage {
    ServerHandshake(ServerHandshake),
    UnknownMessage(u8, Bytes),
    LogMessage(LogMessage),
    ErrorResponse(ErrorResponse),
    Authentication(Authentication),
    ReadyForCommand(ReadyForCommand),
    ServerKeyData(ServerKeyData),
    ParameterStatus(ParameterStatus),
    CommandComplete0(CommandComplete0),
    CommandComplete1(CommandComplete1),
    PrepareComplete(PrepareComplete),
    CommandDataDescription0(CommandDataDescription0), // protocol < 1.0
    CommandDataDescription1(CommandDataDescription1), // protocol >= 1.0
    StateDataDescription(StateDataDescription),
    Data(Data),
    RestoreReady(RestoreReady),
    DumpHeader(RawPacket),
    DumpBlock(RawPacket),
}
```
*/

use std::collections::HashMap;
use std::convert::TryFrom;

use bytes::Bytes;
use uuid::Uuid;

use crate::common::Capabilities;
pub use crate::common::{Cardinality, RawTypedesc, State};
use crate::descriptors::Typedesc;
pub use crate::enums::TransactionState;
use crate::annotations::{Annotations, KeyValues};
use crate::buffer::{Decode, Encode, Input, Output};
use crate::errors::{self, DecodeError, EncodeError};
use crate::features::ProtocolVersion;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServerMessage {
    Authentication(Authentication),
    CommandComplete0(CommandComplete0),
    CommandComplete1(CommandComplete1),
    CommandDataDescription0(CommandDataDescription0), // protocol < 1.0
    CommandDataDescription1(CommandDataDescription1), // protocol >= 1.0
    StateDataDescription(StateDataDescription),
    Data(Data),
    // Dump packets are only ever processed as a whole, never decoded further.
    DumpHeader(RawPacket),
    DumpBlock(RawPacket),
    ErrorResponse(ErrorResponse),
    LogMessage(LogMessage),
    ParameterStatus(ParameterStatus),
    ReadyForCommand(ReadyForCommand),
    RestoreReady(RestoreReady),
    ServerHandshake(ServerHandshake),
    ServerKeyData(ServerKeyData),
    UnknownMessage(u8, Bytes),
    PrepareComplete(PrepareComplete),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyForCommand {
    pub annotations: Annotations,
    pub transaction_state: TransactionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Ok,
    Sasl { methods: Vec<String> },
    SaslContinue { data: Bytes },
    SaslFinal { data: Bytes },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Error,
    Fatal,
    Panic,
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Debug,
    Info,
    Notice,
    Warning,
    Unknown(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub severity: ErrorSeverity,
    pub code: u32,
    pub message: String,
    pub attributes: KeyValues,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub severity: MessageSeverity,
    pub code: u32,
    pub text: String,
    pub annotations: Annotations,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandshake {
    pub major_ver: u16,
    pub minor_ver: u16,
    pub extensions: HashMap<String, Annotations>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerKeyData {
    pub data: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterStatus {
    pub proto: ProtocolVersion,
    pub name: Bytes,
    pub value: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandComplete0 {
    pub headers: KeyValues,
    pub status_data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandComplete1 {
    pub annotations: Annotations,
    pub capabilities: Capabilities,
    pub status: String,
    pub state: Option<State>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareComplete {
    pub headers: KeyValues,
    pub cardinality: Cardinality,
    pub input_typedesc_id: Uuid,
    pub output_typedesc_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDataDescription0 {
    pub headers: KeyValues,
    pub result_cardinality: Cardinality,
    pub input: RawTypedesc,
    pub output: RawTypedesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDataDescription1 {
    pub annotations: Annotations,
    pub capabilities: Capabilities,
    pub result_cardinality: Cardinality,
    pub input: RawTypedesc,
    pub output: RawTypedesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDataDescription {
    pub typedesc: RawTypedesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub data: Vec<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReady {
    pub headers: KeyValues,
    pub jobs: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub data: Bytes,
}

impl CommandDataDescription0 {
    pub fn output(&self) -> Result<Typedesc, DecodeError> {
        self.output.decode()
    }
    pub fn input(&self) -> Result<Typedesc, DecodeError> {
        self.input.decode()
    }
}

impl CommandDataDescription1 {
    pub fn output(&self) -> Result<Typedesc, DecodeError> {
        self.output.decode()
    }
    pub fn input(&self) -> Result<Typedesc, DecodeError> {
        self.input.decode()
    }
}

impl From<CommandDataDescription0> for CommandDataDescription1 {
    fn from(value: CommandDataDescription0) -> Self {
        Self {
            annotations: HashMap::new(),
            capabilities: decode_capabilities0(&value.headers).unwrap_or(Capabilities::ALL),
            result_cardinality: value.result_cardinality,
            input: value.input,
            output: value.output,
        }
    }
}

impl StateDataDescription {
    pub fn parse(self) -> Result<Typedesc, DecodeError> {
        self.typedesc.decode()
    }
}

impl ParameterStatus {
    pub fn parse_system_config(self) -> Result<(Typedesc, Bytes), DecodeError> {
        let cur = &mut Input::new(self.proto, self.value);
        let typedesc_data = Bytes::decode(cur)?;
        let data = Bytes::decode(cur)?;

        let typedesc_buf = &mut Input::new(self.proto, typedesc_data);
        let typedesc_id = Uuid::decode(typedesc_buf)?;
        let typedesc = Typedesc::decode_with_id(typedesc_id, typedesc_buf)?;
        Ok((typedesc, data))
    }
}

impl ServerMessage {
    pub fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        use ServerMessage::*;
        match self {
            ServerHandshake(h) => crate::buffer::encode(buf, 0x76, h),
            ErrorResponse(h) => crate::buffer::encode(buf, 0x45, h),
            LogMessage(h) => crate::buffer::encode(buf, 0x4c, h),
            Authentication(h) => crate::buffer::encode(buf, 0x52, h),
            ReadyForCommand(h) => crate::buffer::encode(buf, 0x5a, h),
            ServerKeyData(h) => crate::buffer::encode(buf, 0x4b, h),
            ParameterStatus(h) => crate::buffer::encode(buf, 0x53, h),
            CommandComplete0(h) => crate::buffer::encode(buf, 0x43, h),
            CommandComplete1(h) => crate::buffer::encode(buf, 0x43, h),
            PrepareComplete(h) => crate::buffer::encode(buf, 0x31, h),
            CommandDataDescription0(h) => crate::buffer::encode(buf, 0x54, h),
            CommandDataDescription1(h) => crate::buffer::encode(buf, 0x54, h),
            StateDataDescription(h) => crate::buffer::encode(buf, 0x73, h),
            Data(h) => crate::buffer::encode(buf, 0x44, h),
            RestoreReady(h) => crate::buffer::encode(buf, 0x2b, h),
            DumpHeader(h) => crate::buffer::encode(buf, 0x40, h),
            DumpBlock(h) => crate::buffer::encode(buf, 0x3d, h),

            UnknownMessage(_, _) => errors::UnknownMessageCantBeEncoded.fail()?,
        }
    }

    /// Decode one frame: `type_byte` has already been peeked by the caller,
    /// `buf` is positioned right after the 4-byte length.
    pub fn decode(type_byte: u8, buf: &mut Input) -> Result<ServerMessage, DecodeError> {
        use self::ServerMessage as M;
        let result = match type_byte {
            0x76 => ServerHandshake::decode(buf).map(M::ServerHandshake)?,
            0x45 => ErrorResponse::decode(buf).map(M::ErrorResponse)?,
            0x4c => LogMessage::decode(buf).map(M::LogMessage)?,
            0x52 => Authentication::decode(buf).map(M::Authentication)?,
            0x5a => ReadyForCommand::decode(buf).map(M::ReadyForCommand)?,
            0x4b => ServerKeyData::decode(buf).map(M::ServerKeyData)?,
            0x53 => ParameterStatus::decode(buf).map(M::ParameterStatus)?,
            0x43 => {
                if buf.proto().is_1() {
                    CommandComplete1::decode(buf).map(M::CommandComplete1)?
                } else {
                    CommandComplete0::decode(buf).map(M::CommandComplete0)?
                }
            }
            0x31 => PrepareComplete::decode(buf).map(M::PrepareComplete)?,
            0x44 => Data::decode(buf).map(M::Data)?,
            0x2b => RestoreReady::decode(buf).map(M::RestoreReady)?,
            0x40 => RawPacket::decode(buf).map(M::DumpHeader)?,
            0x3d => RawPacket::decode(buf).map(M::DumpBlock)?,
            0x54 => {
                if buf.proto().is_1() {
                    CommandDataDescription1::decode(buf).map(M::CommandDataDescription1)?
                } else {
                    CommandDataDescription0::decode(buf).map(M::CommandDataDescription0)?
                }
            }
            0x73 => StateDataDescription::decode(buf).map(M::StateDataDescription)?,
            code => M::UnknownMessage(code, buf.take_rest()),
        };
        Ok(result)
    }
}

fn encode_annotations(buf: &mut Output, ann: &Annotations) -> Result<(), EncodeError> {
    use snafu::OptionExt;
    let count = u16::try_from(ann.len())
        .ok()
        .context(errors::TooManyHeaders)?;
    buf.put_u16(count);
    for (name, value) in ann {
        name.encode(buf)?;
        value.encode(buf)?;
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

fn encode_headers(buf: &mut Output, headers: &KeyValues) -> Result<(), EncodeError> {
    use snafu::OptionExt;
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

impl Encode for ServerHandshake {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        use snafu::OptionExt;
        buf.put_u16(self.major_ver);
        buf.put_u16(self.minor_ver);
        let count = u16::try_from(self.extensions.len())
            .ok()
            .context(errors::TooManyExtensions)?;
        buf.put_u16(count);
        for (name, headers) in &self.extensions {
            name.encode(buf)?;
            encode_annotations(buf, headers)?;
        }
        Ok(())
    }
}

impl Decode for ServerHandshake {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let major_ver = buf.pop_u16()?;
        let minor_ver = buf.pop_u16()?;
        let count = buf.pop_u16()?;
        let mut extensions = HashMap::new();
        for _ in 0..count {
            let name = String::decode(buf)?;
            let headers = decode_annotations(buf)?;
            extensions.insert(name, headers);
        }
        Ok(ServerHandshake {
            major_ver,
            minor_ver,
            extensions,
        })
    }
}

impl Encode for ErrorResponse {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_u8(self.severity.to_u8());
        buf.put_u32(self.code);
        self.message.encode(buf)?;
        encode_headers(buf, &self.attributes)?;
        Ok(())
    }
}

impl Decode for ErrorResponse {
    fn decode(buf: &mut Input) -> Result<ErrorResponse, DecodeError> {
        let severity = ErrorSeverity::from_u8(buf.pop_u8()?);
        let code = buf.pop_u32()?;
        let message = String::decode(buf)?;
        let attributes = decode_headers(buf)?;
        Ok(ErrorResponse {
            severity,
            code,
            message,
            attributes,
        })
    }
}

impl Encode for LogMessage {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.put_u8(self.severity.to_u8());
        buf.put_u32(self.code);
        self.text.encode(buf)?;
        encode_annotations(buf, &self.annotations)?;
        Ok(())
    }
}

impl Decode for LogMessage {
    fn decode(buf: &mut Input) -> Result<LogMessage, DecodeError> {
        let severity = MessageSeverity::from_u8(buf.pop_u8()?);
        let code = buf.pop_u32()?;
        let text = String::decode(buf)?;
        let annotations = decode_annotations(buf)?;
        Ok(LogMessage {
            severity,
            code,
            text,
            annotations,
        })
    }
}

impl Encode for Authentication {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        use snafu::OptionExt;
        use Authentication as A;
        match self {
            A::Ok => buf.put_u32(0x0),
            A::Sasl { methods } => {
                buf.put_u32(0x0A);
                let count = u16::try_from(methods.len())
                    .ok()
                    .context(errors::TooManyMethods)?;
                buf.put_u16(count);
                for m in methods {
                    m.encode(buf)?;
                }
            }
            A::SaslContinue { data } => {
                buf.put_u32(0x0B);
                data.encode(buf)?;
            }
            A::SaslFinal { data } => {
                buf.put_u32(0x0C);
                data.encode(buf)?;
            }
        }
        Ok(())
    }
}

impl Decode for Authentication {
    fn decode(buf: &mut Input) -> Result<Authentication, DecodeError> {
        let auth_status = buf.pop_u32()?;
        match auth_status {
            0x0 => Ok(Authentication::Ok),
            0x0A => {
                let count = buf.pop_u16()?;
                let mut methods = Vec::new();
                for _ in 0..count {
                    methods.push(String::decode(buf)?);
                }
                Ok(Authentication::Sasl { methods })
            }
            0x0B => Ok(Authentication::SaslContinue {
                data: Bytes::decode(buf)?,
            }),
            0x0C => Ok(Authentication::SaslFinal {
                data: Bytes::decode(buf)?,
            }),
            _ => errors::AuthStatusInvalid { auth_status }.fail(),
        }
    }
}

impl Encode for ReadyForCommand {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_annotations(buf, &self.annotations)?;
        buf.put_u8(self.transaction_state as u8);
        Ok(())
    }
}

impl Decode for ReadyForCommand {
    fn decode(buf: &mut Input) -> Result<ReadyForCommand, DecodeError> {
        let annotations = decode_annotations(buf)?;
        let transaction_state = TransactionState::try_from(buf.pop_u8()?)?;
        Ok(ReadyForCommand {
            annotations,
            transaction_state,
        })
    }
}

impl ErrorSeverity {
    pub fn from_u8(code: u8) -> ErrorSeverity {
        use ErrorSeverity::*;
        match code {
            120 => Error,
            200 => Fatal,
            255 => Panic,
            _ => Unknown(code),
        }
    }
    pub fn to_u8(&self) -> u8 {
        use ErrorSeverity::*;
        match *self {
            Error => 120,
            Fatal => 200,
            Panic => 255,
            Unknown(code) => code,
        }
    }
}

impl MessageSeverity {
    fn from_u8(code: u8) -> MessageSeverity {
        use MessageSeverity::*;
        match code {
            20 => Debug,
            40 => Info,
            60 => Notice,
            80 => Warning,
            _ => Unknown(code),
        }
    }
    fn to_u8(self) -> u8 {
        use MessageSeverity::*;
        match self {
            Debug => 20,
            Info => 40,
            Notice => 60,
            Warning => 80,
            Unknown(code) => code,
        }
    }
}

impl Encode for ServerKeyData {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.extend(&self.data);
        Ok(())
    }
}

impl Decode for ServerKeyData {
    fn decode(buf: &mut Input) -> Result<ServerKeyData, DecodeError> {
        let raw = buf.pop_slice(32)?;
        let mut data = [0u8; 32];
        data.copy_from_slice(&raw);
        Ok(ServerKeyData { data })
    }
}

impl Encode for ParameterStatus {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        self.name.encode(buf)?;
        self.value.encode(buf)?;
        Ok(())
    }
}

impl Decode for ParameterStatus {
    fn decode(buf: &mut Input) -> Result<ParameterStatus, DecodeError> {
        Ok(ParameterStatus {
            proto: *buf.proto(),
            name: Bytes::decode(buf)?,
            value: Bytes::decode(buf)?,
        })
    }
}

impl Encode for CommandComplete0 {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(buf, &self.headers)?;
        self.status_data.encode(buf)?;
        Ok(())
    }
}

impl Decode for CommandComplete0 {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let status_data = Bytes::decode(buf)?;
        Ok(CommandComplete0 {
            headers,
            status_data,
        })
    }
}

impl Encode for CommandComplete1 {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_annotations(buf, &self.annotations)?;
        buf.put_u64(self.capabilities.bits());
        self.status.encode(buf)?;
        match &self.state {
            Some(state) => {
                state.typedesc_id.encode(buf)?;
                state.data.encode(buf)?;
            }
            None => {
                Uuid::from_u128(0).encode(buf)?;
                Bytes::new().encode(buf)?;
            }
        }
        Ok(())
    }
}

impl Decode for CommandComplete1 {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let annotations = decode_annotations(buf)?;
        let capabilities = Capabilities::from_bits_retain(buf.pop_u64()?);
        let status = String::decode(buf)?;
        let typedesc_id = Uuid::decode(buf)?;
        let data = Bytes::decode(buf)?;
        let state = if typedesc_id == Uuid::from_u128(0) {
            None
        } else {
            Some(State { typedesc_id, data })
        };
        Ok(CommandComplete1 {
            annotations,
            capabilities,
            status,
            state,
        })
    }
}

impl Encode for PrepareComplete {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(buf, &self.headers)?;
        buf.put_u8(self.cardinality as u8);
        self.input_typedesc_id.encode(buf)?;
        self.output_typedesc_id.encode(buf)?;
        Ok(())
    }
}

impl Decode for PrepareComplete {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let cardinality = Cardinality::try_from(buf.pop_u8()?)?;
        let input_typedesc_id = Uuid::decode(buf)?;
        let output_typedesc_id = Uuid::decode(buf)?;
        Ok(PrepareComplete {
            headers,
            cardinality,
            input_typedesc_id,
            output_typedesc_id,
        })
    }
}

impl Encode for CommandDataDescription0 {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        debug_assert!(!buf.proto().is_1());
        encode_headers(buf, &self.headers)?;
        buf.put_u8(self.result_cardinality as u8);
        self.input.id.encode(buf)?;
        self.input.data.encode(buf)?;
        self.output.id.encode(buf)?;
        self.output.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for CommandDataDescription0 {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let result_cardinality = Cardinality::try_from(buf.pop_u8()?)?;
        let proto = *buf.proto();
        let input = RawTypedesc {
            proto,
            id: Uuid::decode(buf)?,
            data: Bytes::decode(buf)?,
        };
        let output = RawTypedesc {
            proto,
            id: Uuid::decode(buf)?,
            data: Bytes::decode(buf)?,
        };
        Ok(CommandDataDescription0 {
            headers,
            result_cardinality,
            input,
            output,
        })
    }
}

impl Encode for CommandDataDescription1 {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        debug_assert!(buf.proto().is_1());
        encode_annotations(buf, &self.annotations)?;
        buf.put_u64(self.capabilities.bits());
        buf.put_u8(self.result_cardinality as u8);
        self.input.id.encode(buf)?;
        self.input.data.encode(buf)?;
        self.output.id.encode(buf)?;
        self.output.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for CommandDataDescription1 {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let annotations = decode_annotations(buf)?;
        let capabilities = Capabilities::from_bits_retain(buf.pop_u64()?);
        let result_cardinality = Cardinality::try_from(buf.pop_u8()?)?;
        let proto = *buf.proto();
        let input = RawTypedesc {
            proto,
            id: Uuid::decode(buf)?,
            data: Bytes::decode(buf)?,
        };
        let output = RawTypedesc {
            proto,
            id: Uuid::decode(buf)?,
            data: Bytes::decode(buf)?,
        };
        Ok(CommandDataDescription1 {
            annotations,
            capabilities,
            result_cardinality,
            input,
            output,
        })
    }
}

impl Encode for StateDataDescription {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        debug_assert!(buf.proto().is_1());
        self.typedesc.id.encode(buf)?;
        self.typedesc.data.encode(buf)?;
        Ok(())
    }
}

impl Decode for StateDataDescription {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let proto = *buf.proto();
        let id = Uuid::decode(buf)?;
        let data = Bytes::decode(buf)?;
        Ok(StateDataDescription {
            typedesc: RawTypedesc { proto, id, data },
        })
    }
}

impl Encode for Data {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        use snafu::OptionExt;
        let count = u16::try_from(self.data.len())
            .ok()
            .context(errors::TooManyElements)?;
        buf.put_u16(count);
        for chunk in &self.data {
            chunk.encode(buf)?;
        }
        Ok(())
    }
}

impl Decode for Data {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let count = buf.pop_u16()?;
        let mut data = Vec::new();
        for _ in 0..count {
            data.push(Bytes::decode(buf)?);
        }
        Ok(Data { data })
    }
}

impl Encode for RestoreReady {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        encode_headers(buf, &self.headers)?;
        buf.put_u16(self.jobs);
        Ok(())
    }
}

impl Decode for RestoreReady {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        let headers = decode_headers(buf)?;
        let jobs = buf.pop_u16()?;
        Ok(RestoreReady { headers, jobs })
    }
}

impl Encode for RawPacket {
    fn encode(&self, buf: &mut Output) -> Result<(), EncodeError> {
        buf.extend(&self.data);
        Ok(())
    }
}

impl Decode for RawPacket {
    fn decode(buf: &mut Input) -> Result<Self, DecodeError> {
        Ok(RawPacket {
            data: buf.take_rest(),
        })
    }
}

impl PrepareComplete {
    pub fn get_capabilities(&self) -> Option<Capabilities> {
        decode_capabilities0(&self.headers)
    }
}

fn decode_capabilities0(headers: &KeyValues) -> Option<Capabilities> {
    headers.get(&0x1001).and_then(|bytes| {
        if bytes.len() == 8 {
            let mut array = [0u8; 8];
            array.copy_from_slice(bytes);
            Some(Capabilities::from_bits_retain(u64::from_be_bytes(array)))
        } else {
            None
        }
    })
}
