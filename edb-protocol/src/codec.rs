//! The codec engine: compiles a [`Codec`] — a paired
//! encoder/decoder bound to a descriptor id — out of a [`Typedesc`] entry.
//! Scalar codecs cover every built-in type with its fixed or
//! length-prefixed wire layout; composite codecs recurse into their
//! element codecs, all built once and cached by the caller
//! ([`crate::queryable::DescriptorContext`], `edb-client`'s codec cache).

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::buffer::{Decode, Encode, Input, Output};
use crate::descriptors::{Descriptor, Typedesc, TypePos};
use crate::errors::{self, invalid_value, CodecError, DecodeError, EncodeError};
use crate::features::ProtocolVersion;
use crate::model::{
    self, BigInt, ConfigMemory, DateDuration, Datetime, Decimal, Duration, LocalDate,
    LocalDatetime, LocalTime, RelativeDuration,
};
use crate::value::{Range, Value};

/// A compiled encoder/decoder bound to one descriptor.
///
/// Implementations are built once per `(descriptor_id, shape)` and shared
/// behind an `Arc` across the per-connection codec cache.
pub trait Codec: fmt::Debug + Send + Sync {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError>;
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError>;
}

macro_rules! scalar_codec {
    ($name:ident, $variant:ident, $kind:expr) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl $name {
            const KIND: &'static str = $kind;
        }
    };
}

scalar_codec!(UuidCodec, Uuid, "uuid");
scalar_codec!(StrCodec, Str, "str");
scalar_codec!(BytesCodec, Bytes, "bytes");
scalar_codec!(BoolCodec, Bool, "bool");
scalar_codec!(Int16Codec, Int16, "int16");
scalar_codec!(Int32Codec, Int32, "int32");
scalar_codec!(Int64Codec, Int64, "int64");
scalar_codec!(Float32Codec, Float32, "float32");
scalar_codec!(Float64Codec, Float64, "float64");
scalar_codec!(BigIntCodec, BigInt, "bigint");
scalar_codec!(DecimalCodec, Decimal, "decimal");
scalar_codec!(ConfigMemoryCodec, ConfigMemory, "cfg::memory");
scalar_codec!(JsonCodec, Json, "json");
scalar_codec!(DatetimeCodec, Datetime, "datetime");
scalar_codec!(DurationCodec, Duration, "duration");
scalar_codec!(RelativeDurationCodec, RelativeDuration, "relative_duration");
scalar_codec!(DateDurationCodec, DateDuration, "date_duration");
scalar_codec!(LocalDatetimeCodec, LocalDatetime, "local_datetime");
scalar_codec!(LocalDateCodec, LocalDate, "local_date");
scalar_codec!(LocalTimeCodec, LocalTime, "local_time");

impl Codec for UuidCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Uuid(v) => {
                buf.put_uuid(*v);
                Ok(())
            }
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        Ok(Value::Uuid(input.pop_uuid()?))
    }
}

impl Codec for StrCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Str(v) => {
                buf.extend(v.as_bytes());
                Ok(())
            }
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        String::from_utf8(buf.to_vec())
            .map(Value::Str)
            .map_err(|e| errors::decode_error(e))
    }
}

impl Codec for BytesCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Bytes(v) => {
                buf.extend(v);
                Ok(())
            }
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        Ok(Value::Bytes(buf.clone()))
    }
}

impl Codec for BoolCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Bool(v) => {
                buf.put_u8(if *v { 1 } else { 0 });
                Ok(())
            }
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        if buf.len() != 1 {
            return errors::Underflow.fail();
        }
        match buf[0] {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            val => errors::InvalidBool { val }.fail(),
        }
    }
}

macro_rules! int_codec {
    ($ty:ident, $prim:ty, $variant:ident, $put:ident, $get:ident, $len:expr) => {
        impl Codec for $ty {
            fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
                match value {
                    Value::$variant(v) => {
                        buf.$put(*v);
                        Ok(())
                    }
                    _ => Err(invalid_value(Self::KIND, value)),
                }
            }
            fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
                if buf.len() != $len {
                    return errors::Underflow.fail();
                }
                let mut input = Input::new(ProtocolVersion::current(), buf.clone());
                Ok(Value::$variant(input.$get()?))
            }
        }
    };
}

int_codec!(Int16Codec, i16, Int16, put_i16, pop_i16, 2);
int_codec!(Int32Codec, i32, Int32, put_i32, pop_i32, 4);
int_codec!(Int64Codec, i64, Int64, put_i64, pop_i64, 8);
int_codec!(Float32Codec, f32, Float32, put_f32, pop_f32, 4);
int_codec!(Float64Codec, f64, Float64, put_f64, pop_f64, 8);

impl Codec for BigIntCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::BigInt(v) => v.encode(buf),
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        Ok(Value::BigInt(model::BigInt::decode(&mut input)?))
    }
}

impl Codec for DecimalCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Decimal(v) => v.encode(buf),
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        Ok(Value::Decimal(model::Decimal::decode(&mut input)?))
    }
}

impl Codec for ConfigMemoryCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::ConfigMemory(v) => v.encode(buf),
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        Ok(Value::ConfigMemory(model::ConfigMemory::decode(
            &mut input,
        )?))
    }
}

impl Codec for JsonCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Json(v) => {
                buf.put_u8(model::JSON_VERSION);
                buf.extend(v.as_bytes());
                Ok(())
            }
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        Ok(Value::Json(model::decode_json(&mut input)?))
    }
}

macro_rules! temporal_codec {
    ($ty:ident, $variant:ident, $model:ident) => {
        impl Codec for $ty {
            fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
                match value {
                    Value::$variant(v) => v.encode(buf),
                    _ => Err(invalid_value(Self::KIND, value)),
                }
            }
            fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
                Ok(Value::$variant($model::decode(buf)?))
            }
        }
    };
}

temporal_codec!(DatetimeCodec, Datetime, Datetime);
temporal_codec!(LocalDatetimeCodec, LocalDatetime, LocalDatetime);
temporal_codec!(LocalDateCodec, LocalDate, LocalDate);
temporal_codec!(LocalTimeCodec, LocalTime, LocalTime);
temporal_codec!(DurationCodec, Duration, Duration);

impl Codec for RelativeDurationCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::RelativeDuration(v) => v.encode(buf),
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        Ok(Value::RelativeDuration(RelativeDuration::decode(buf)?))
    }
}

impl Codec for DateDurationCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::DateDuration(v) => v.encode(buf),
            _ => Err(invalid_value(Self::KIND, value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        Ok(Value::DateDuration(DateDuration::decode(buf)?))
    }
}

/// `enum`: encoded as its UTF-8 variant name. Validates the
/// decoded name is one of the type's declared members.
#[derive(Debug, Clone)]
pub struct EnumCodec {
    pub members: Vec<String>,
}

impl Codec for EnumCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Enum(v) => {
                buf.extend(v.as_bytes());
                Ok(())
            }
            _ => Err(invalid_value("enum", value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let name = String::from_utf8(buf.to_vec()).map_err(|e| errors::decode_error(e))?;
        if !self.members.iter().any(|m| m == &name) {
            return errors::ExtraEnumValue.fail();
        }
        Ok(Value::Enum(name))
    }
}

/// `array`: `{ndims, reserved:u64, per-dim {upper, lower}, n × length-prefixed
/// element}`. Only the single-dimension case used for normal
/// query results is supported; multi-dimensional arrays decode their flat
/// element stream into a single `Vec`.
#[derive(Debug, Clone)]
pub struct ArrayCodec {
    pub element: Arc<dyn Codec>,
}

impl Codec for ArrayCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        let elements = match value {
            Value::Array(v) => v,
            _ => return Err(invalid_value("array", value)),
        };
        let len = u32::try_from(elements.len()).map_err(|_| errors::ArrayTooLong.build())?;
        buf.put_u32(1); // ndims
        buf.put_u64(0); // reserved
        buf.put_u32(len); // upper bound
        buf.put_u32(1); // lower bound
        for el in elements {
            buf.begin_bytes();
            self.element.encode(buf, el)?;
            buf.end_bytes()?;
        }
        Ok(())
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        let ndims = input.pop_u32()?;
        input.pop_u64()?; // reserved
        let mut total = 1u32;
        for _ in 0..ndims {
            let upper = input.pop_u32()?;
            let _lower = input.pop_u32()?;
            total = total.saturating_mul(upper);
        }
        if ndims == 0 {
            total = 0;
        }
        let mut elements = Vec::with_capacity(total as usize);
        for _ in 0..total {
            let data = input.pop_bytes()?;
            elements.push(self.element.decode(&data)?);
        }
        Ok(Value::Array(elements))
    }
}

/// Shared `{nelems:u32, n × {reserved:u32, len:u32, data}}` layout for
/// tuple/named-tuple/object/input-shape.
fn encode_fields(
    buf: &mut Output,
    fields: &[Option<&Value>],
    codecs: &[Arc<dyn Codec>],
) -> Result<(), EncodeError> {
    let len = u32::try_from(fields.len()).map_err(|_| errors::TooManyElements.build())?;
    buf.put_u32(len);
    for (field, codec) in fields.iter().zip(codecs) {
        buf.put_u32(0); // reserved
        match field {
            Some(v) => {
                buf.begin_bytes();
                codec.encode(buf, v)?;
                buf.end_bytes()?;
            }
            None => buf.put_i32(-1),
        }
    }
    Ok(())
}

fn decode_fields(
    input: &mut Input,
    codecs: &[Arc<dyn Codec>],
) -> Result<Vec<Option<Value>>, DecodeError> {
    let count = input.pop_u32()?;
    if count as usize != codecs.len() {
        return errors::TupleSizeMismatch.fail();
    }
    let mut out = Vec::with_capacity(codecs.len());
    for codec in codecs {
        input.pop_u32()?; // reserved
        let len = input.pop_i32()?;
        if len < 0 {
            out.push(None);
        } else {
            let data = input.pop_slice(len as usize)?;
            out.push(Some(codec.decode(&data)?));
        }
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct TupleCodec {
    pub elements: Vec<Arc<dyn Codec>>,
}

impl Codec for TupleCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        let elements = match value {
            Value::Tuple(v) => v,
            _ => return Err(invalid_value("tuple", value)),
        };
        if elements.len() != self.elements.len() {
            return Err(errors::TupleShapeMismatch.build());
        }
        let fields: Vec<Option<&Value>> = elements.iter().map(Some).collect();
        encode_fields(buf, &fields, &self.elements)
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        let fields = decode_fields(&mut input, &self.elements)?;
        let elements = fields
            .into_iter()
            .map(|f| f.ok_or_else(|| errors::MissingRequiredElement.build()))
            .collect::<Result<_, _>>()?;
        Ok(Value::Tuple(elements))
    }
}

#[derive(Debug, Clone)]
pub struct NamedTupleCodec {
    pub names: Vec<String>,
    pub elements: Vec<Arc<dyn Codec>>,
}

impl Codec for NamedTupleCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        let map = match value {
            Value::NamedTuple(v) => v,
            _ => return Err(invalid_value("named_tuple", value)),
        };
        let fields: Vec<Option<&Value>> = self.names.iter().map(|n| map.get(n)).collect();
        encode_fields(buf, &fields, &self.elements)
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        let fields = decode_fields(&mut input, &self.elements)?;
        let mut map = std::collections::BTreeMap::new();
        for (name, value) in self.names.iter().zip(fields) {
            if let Some(v) = value {
                map.insert(name.clone(), v);
            }
        }
        Ok(Value::NamedTuple(map))
    }
}

/// `object`/`input shape`: same wire layout as tuple, with element names
/// from the shape.
#[derive(Debug, Clone)]
pub struct ObjectCodec {
    pub shape: Vec<Option<String>>,
    pub elements: Vec<Arc<dyn Codec>>,
}

impl Codec for ObjectCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        let fields = match value {
            Value::Object { fields, .. } => fields,
            _ => return Err(invalid_value("object", value)),
        };
        if fields.len() != self.elements.len() {
            return Err(errors::ObjectShapeMismatch.build());
        }
        let refs: Vec<Option<&Value>> = fields.iter().map(|f| f.as_ref()).collect();
        encode_fields(buf, &refs, &self.elements)
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        let fields = decode_fields(&mut input, &self.elements)?;
        Ok(Value::Object {
            shape: self.shape.clone(),
            fields,
        })
    }
}

/// `range`: `{flags:u8, lower?, upper?}` where bit0=empty, bit1=inc_lower,
/// bit2=inc_upper, bit3=infinite_lower, bit4=infinite_upper.
#[derive(Debug, Clone)]
pub struct RangeCodec {
    pub element: Arc<dyn Codec>,
}

const RANGE_EMPTY: u8 = 1 << 0;
const RANGE_INC_LOWER: u8 = 1 << 1;
const RANGE_INC_UPPER: u8 = 1 << 2;
const RANGE_INF_LOWER: u8 = 1 << 3;
const RANGE_INF_UPPER: u8 = 1 << 4;

impl RangeCodec {
    fn encode_range(&self, buf: &mut Output, range: &Range) -> Result<(), EncodeError> {
        let mut flags = 0u8;
        if range.inc_lower {
            flags |= RANGE_INC_LOWER;
        }
        if range.inc_upper {
            flags |= RANGE_INC_UPPER;
        }
        if range.lower.is_none() {
            flags |= RANGE_INF_LOWER;
        }
        if range.upper.is_none() {
            flags |= RANGE_INF_UPPER;
        }
        buf.put_u8(flags);
        if let Some(lower) = &range.lower {
            buf.begin_bytes();
            self.element.encode(buf, lower)?;
            buf.end_bytes()?;
        }
        if let Some(upper) = &range.upper {
            buf.begin_bytes();
            self.element.encode(buf, upper)?;
            buf.end_bytes()?;
        }
        Ok(())
    }

    fn decode_range(&self, input: &mut Input) -> Result<Range, DecodeError> {
        let flags = input.pop_u8()?;
        let lower = if flags & RANGE_INF_LOWER == 0 {
            let data = input.pop_bytes()?;
            Some(Box::new(self.element.decode(&data)?))
        } else {
            None
        };
        let upper = if flags & RANGE_INF_UPPER == 0 {
            let data = input.pop_bytes()?;
            Some(Box::new(self.element.decode(&data)?))
        } else {
            None
        };
        Ok(Range {
            lower,
            upper,
            inc_lower: flags & RANGE_INC_LOWER != 0,
            inc_upper: flags & RANGE_INC_UPPER != 0,
        })
    }
}

impl Codec for RangeCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Range(r) => self.encode_range(buf, r),
            _ => Err(invalid_value("range", value)),
        }
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        Ok(Value::Range(self.decode_range(&mut input)?))
    }
}

/// `multirange`: `{nranges:u32, n × length-prefixed range}`.
#[derive(Debug, Clone)]
pub struct MultiRangeCodec {
    pub range: RangeCodec,
}

impl Codec for MultiRangeCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        let ranges = match value {
            Value::MultiRange(v) => v,
            _ => return Err(invalid_value("multirange", value)),
        };
        let len = u32::try_from(ranges.len()).map_err(|_| errors::ArrayTooLong.build())?;
        buf.put_u32(len);
        for r in ranges {
            buf.begin_bytes();
            self.range.encode_range(buf, r)?;
            buf.end_bytes()?;
        }
        Ok(())
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let mut input = Input::new(ProtocolVersion::current(), buf.clone());
        let count = input.pop_u32()?;
        let mut ranges = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let data = input.pop_bytes()?;
            let mut inner = Input::new(*input.proto(), data);
            ranges.push(self.range.decode_range(&mut inner)?);
        }
        Ok(Value::MultiRange(ranges))
    }
}

/// `set` of `T`: a top-level array of `T` — same wire layout as
/// [`ArrayCodec`], wrapped so `Value::Set` rather than `Value::Array` comes
/// back out.
#[derive(Debug, Clone)]
pub struct SetCodec {
    pub element: Arc<dyn Codec>,
}

impl Codec for SetCodec {
    fn encode(&self, buf: &mut Output, value: &Value) -> Result<(), EncodeError> {
        let elements = match value {
            Value::Set(v) => v,
            _ => return Err(invalid_value("set", value)),
        };
        ArrayCodec {
            element: self.element.clone(),
        }
        .encode(buf, &Value::Array(elements.clone()))
    }
    fn decode(&self, buf: &Bytes) -> Result<Value, DecodeError> {
        let inner = ArrayCodec {
            element: self.element.clone(),
        }
        .decode(buf)?;
        match inner {
            Value::Array(v) => Ok(Value::Set(v)),
            _ => unreachable!(),
        }
    }
}

/// Compiles the codec for the descriptor at `pos` in `desc`, recursing into
/// element/field descriptors as needed.
pub fn build_codec(desc: &Typedesc, pos: TypePos) -> Result<Arc<dyn Codec>, CodecError> {
    let descriptor = desc.get(pos)?;
    Ok(match descriptor {
        Descriptor::BaseScalar(d) => build_base_scalar(d.id)?,
        Descriptor::Scalar(d) => {
            let base = d.base_type_pos.unwrap_or(pos);
            if base == pos {
                build_base_scalar(d.id)?
            } else {
                build_codec(desc, base)?
            }
        }
        Descriptor::Array(d) => Arc::new(ArrayCodec {
            element: build_codec(desc, d.type_pos)?,
        }),
        Descriptor::Tuple(d) => {
            let elements = d
                .element_types
                .iter()
                .map(|p| build_codec(desc, *p))
                .collect::<Result<_, _>>()?;
            Arc::new(TupleCodec { elements })
        }
        Descriptor::NamedTuple(d) => {
            let names = d.elements.iter().map(|e| e.name.clone()).collect();
            let elements = d
                .elements
                .iter()
                .map(|e| build_codec(desc, e.type_pos))
                .collect::<Result<_, _>>()?;
            Arc::new(NamedTupleCodec { names, elements })
        }
        Descriptor::Enum(d) => Arc::new(EnumCodec {
            members: d.members.clone(),
        }),
        Descriptor::Range(d) => Arc::new(RangeCodec {
            element: build_codec(desc, d.type_pos)?,
        }),
        Descriptor::MultiRange(d) => Arc::new(MultiRangeCodec {
            range: RangeCodec {
                element: build_codec(desc, d.type_pos)?,
            },
        }),
        Descriptor::Set(d) => Arc::new(SetCodec {
            element: build_codec(desc, d.type_pos)?,
        }),
        Descriptor::ObjectShape(d) | Descriptor::InputShape(d) | Descriptor::SQLRow(d) => {
            let shape = d
                .elements
                .iter()
                .map(|e| Some(e.name.clone()))
                .collect();
            let elements = d
                .elements
                .iter()
                .map(|e| build_codec(desc, e.type_pos))
                .collect::<Result<_, _>>()?;
            Arc::new(ObjectCodec { shape, elements })
        }
        Descriptor::Object(_) | Descriptor::Compound(_) => {
            return Err(errors::UnexpectedTypePos { position: pos.0 }.build())
        }
    })
}

fn build_base_scalar(id: Uuid) -> Result<Arc<dyn Codec>, CodecError> {
    // Well-known base scalar ids.
    Ok(match id.as_u128() {
        0x0000_0000_0000_0000_0000_0000_0000_0100 => Arc::new(UuidCodec),
        0x0000_0000_0000_0000_0000_0000_0000_0101 => Arc::new(StrCodec),
        0x0000_0000_0000_0000_0000_0000_0000_0102 => Arc::new(BytesCodec),
        0x0000_0000_0000_0000_0000_0000_0000_0103 => Arc::new(Int16Codec),
        0x0000_0000_0000_0000_0000_0000_0000_0104 => Arc::new(Int32Codec),
        0x0000_0000_0000_0000_0000_0000_0000_0105 => Arc::new(Int64Codec),
        0x0000_0000_0000_0000_0000_0000_0000_0106 => Arc::new(Float32Codec),
        0x0000_0000_0000_0000_0000_0000_0000_0107 => Arc::new(Float64Codec),
        0x0000_0000_0000_0000_0000_0000_0000_0108 => Arc::new(DecimalCodec),
        0x0000_0000_0000_0000_0000_0000_0000_0109 => Arc::new(BoolCodec),
        0x0000_0000_0000_0000_0000_0000_0000_010a => Arc::new(DatetimeCodec),
        0x0000_0000_0000_0000_0000_0000_0000_010e => Arc::new(BigIntCodec),
        0x0000_0000_0000_0000_0000_0000_0000_010f => Arc::new(JsonCodec),
        _ => return Err(errors::UndefinedBaseScalar { uuid: id }.build()),
    })
}
