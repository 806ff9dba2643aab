//! A single concrete implementation of the codec engine's output-shape
//! contract: a dynamic enum that can
//! hold the decoded/encoded form of any wire value. This is *not* the
//! reflection-based marshaling that stays out of the core — it is one
//! fixed enum shipped by the core itself, used by the core's own tests and
//! available to callers who don't want compile-time shapes.

use std::collections::BTreeMap;

use bytes::Bytes;
use uuid::Uuid;

use crate::model::{
    BigInt, ConfigMemory, DateDuration, Datetime, Decimal, Duration, LocalDate, LocalDatetime,
    LocalTime, RelativeDuration,
};

#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Nothing,
    Uuid(Uuid),
    Str(String),
    Bytes(Bytes),
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    BigInt(BigInt),
    Decimal(Decimal),
    ConfigMemory(ConfigMemory),
    Json(String),
    Datetime(Datetime),
    Duration(Duration),
    RelativeDuration(RelativeDuration),
    DateDuration(DateDuration),
    LocalDatetime(LocalDatetime),
    LocalDate(LocalDate),
    LocalTime(LocalTime),
    Enum(String),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    NamedTuple(BTreeMap<String, Value>),
    Object {
        shape: Vec<Option<String>>,
        fields: Vec<Option<Value>>,
    },
    Set(Vec<Value>),
    Range(Range),
    MultiRange(Vec<Range>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub lower: Option<Box<Value>>,
    pub upper: Option<Box<Value>>,
    pub inc_lower: bool,
    pub inc_upper: bool,
}

impl Value {
    /// Short name used in error messages.
    pub fn kind(&self) -> &'static str {
        use Value::*;
        match self {
            Nothing => "nothing",
            Uuid(..) => "uuid",
            Str(..) => "str",
            Bytes(..) => "bytes",
            Bool(..) => "bool",
            Int16(..) => "int16",
            Int32(..) => "int32",
            Int64(..) => "int64",
            Float32(..) => "float32",
            Float64(..) => "float64",
            BigInt(..) => "bigint",
            Decimal(..) => "decimal",
            ConfigMemory(..) => "cfg::memory",
            Json(..) => "json",
            Datetime(..) => "datetime",
            Duration(..) => "duration",
            RelativeDuration(..) => "relative_duration",
            DateDuration(..) => "date_duration",
            LocalDatetime(..) => "local_datetime",
            LocalDate(..) => "local_date",
            LocalTime(..) => "local_time",
            Enum(..) => "enum",
            Array(..) => "array",
            Tuple(..) => "tuple",
            NamedTuple(..) => "named_tuple",
            Object { .. } => "object",
            Set(..) => "set",
            Range(..) => "range",
            MultiRange(..) => "multirange",
        }
    }
}
