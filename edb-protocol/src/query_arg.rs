//! Positional query-argument encoding: the input-side counterpart of
//! [`crate::queryable::Queryable`]. `edb-client` builds a [`QueryArgContext`]
//! from the server's `in_desc` and hands it to [`Encoder::new`]; the caller's
//! argument tuple then encodes itself into that encoder.

use bytes::BytesMut;
use edb_errors::{Error, ErrorKind, ProtocolEncodingError};

use crate::buffer::Output;
use crate::codec::Codec;
use crate::descriptors::{Descriptor, Typedesc, TypePos};
use crate::value::Value;

/// View over the root input [`Typedesc`] that [`Encoder`] encodes against.
pub struct QueryArgContext<'a> {
    typedesc: &'a Typedesc,
    root_pos: Option<TypePos>,
}

impl<'a> QueryArgContext<'a> {
    pub fn new(typedesc: &'a Typedesc) -> QueryArgContext<'a> {
        QueryArgContext {
            typedesc,
            root_pos: typedesc.root_pos(),
        }
    }

    fn root_descriptor(&self) -> Result<&'a Descriptor, Error> {
        let pos = self
            .root_pos
            .ok_or_else(|| ProtocolEncodingError::with_message("input descriptor has no root"))?;
        self.typedesc
            .get(pos)
            .map_err(ProtocolEncodingError::with_source)
    }
}

impl Typedesc {
    /// Builds the [`QueryArgContext`] a [`QueryArgs`] impl encodes against.
    pub fn as_query_arg_context(&self) -> QueryArgContext<'_> {
        QueryArgContext::new(self)
    }
}

/// Writes one query's positional arguments into the `Execute` message's
/// `arguments` field, validating each value against the input descriptor
/// tree as it goes.
pub struct Encoder<'a, 'o> {
    ctx: &'a QueryArgContext<'a>,
    buf: &'o mut BytesMut,
}

impl<'a, 'o> Encoder<'a, 'o> {
    pub fn new(ctx: &'a QueryArgContext<'a>, buf: &'o mut BytesMut) -> Encoder<'a, 'o> {
        Encoder { ctx, buf }
    }

    /// Encodes one positional tuple of `values` against the root input
    /// descriptor's shape.
    pub fn encode_tuple(&mut self, values: Vec<Value>) -> Result<(), Error> {
        let root_pos = match self.ctx.root_pos {
            Some(pos) => pos,
            None if values.is_empty() => return Ok(()),
            None => return Err(ProtocolEncodingError::with_message("no arguments expected")),
        };
        let codec = crate::codec::build_codec(self.ctx.typedesc, root_pos)
            .map_err(ProtocolEncodingError::with_source)?;
        let value = Value::Tuple(values);
        let mut out = Output::new(crate::features::ProtocolVersion::current());
        codec
            .encode(&mut out, &value)
            .map_err(ProtocolEncodingError::with_source)?;
        self.buf.extend_from_slice(&out.send());
        Ok(())
    }

    pub fn root_descriptor(&self) -> Result<&'a Descriptor, Error> {
        self.ctx.root_descriptor()
    }
}

/// Implemented by whatever positional-argument tuple a caller passes to
/// `Execute`/`Query`/.... The
/// [`Vec<Value>`]/`[Value]` fallback implementations let callers build
/// arguments dynamically without a derive macro.
///
/// Positional arguments are encoded as a plain tuple, so every argument must
/// be present; optional parameters are modeled with `Value` itself carrying
/// an explicit `Nothing`, not by omitting the slot.
pub trait QueryArgs {
    fn encode(&self, encoder: &mut Encoder) -> Result<(), Error>;
}

impl QueryArgs for () {
    fn encode(&self, encoder: &mut Encoder) -> Result<(), Error> {
        encoder.encode_tuple(Vec::new())
    }
}

impl QueryArgs for Vec<Value> {
    fn encode(&self, encoder: &mut Encoder) -> Result<(), Error> {
        encoder.encode_tuple(self.clone())
    }
}

impl QueryArgs for [Value] {
    fn encode(&self, encoder: &mut Encoder) -> Result<(), Error> {
        encoder.encode_tuple(self.to_vec())
    }
}

macro_rules! value_args_tuple {
    ($($idx:tt : $ty:ident),+) => {
        impl<$($ty: Into<Value> + Clone),+> QueryArgs for ($($ty,)+) {
            fn encode(&self, encoder: &mut Encoder) -> Result<(), Error> {
                encoder.encode_tuple(vec![$(self.$idx.clone().into()),+])
            }
        }
    };
}

value_args_tuple!(0: A);
value_args_tuple!(0: A, 1: B);
value_args_tuple!(0: A, 1: B, 2: C);
value_args_tuple!(0: A, 1: B, 2: C, 3: D);

macro_rules! value_from_scalar {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Value {
            fn from(v: $ty) -> Value {
                Value::$variant(v)
            }
        }
    };
}

value_from_scalar!(String, Str);
value_from_scalar!(bool, Bool);
value_from_scalar!(i16, Int16);
value_from_scalar!(i32, Int32);
value_from_scalar!(i64, Int64);
value_from_scalar!(f32, Float32);
value_from_scalar!(f64, Float64);

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_owned())
    }
}
