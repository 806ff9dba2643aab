//! The Shape-capability trait contract: lets a compile-time-typed host value
//! describe, ahead of time, how it expects a descriptor tree to be shaped,
//! instead of the codec engine discovering structure through runtime
//! reflection. A language-binding derive macro is the usual implementor of
//! [`Queryable`]; this crate only consumes the contract.

use std::sync::Arc;

use bytes::Bytes;
use edb_errors::{DescriptorMismatch, Error, ErrorKind};

use crate::codec::{self, Codec};
use crate::descriptors::{Descriptor, Typedesc, TypePos};
use crate::errors::{CodecError, DecodeError};

/// Per-decode flags describing which implicit fields the server injected
/// into an object shape: the client asked
/// for implicit `id`, type id, and/or type name columns, and the decoder
/// must skip over them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    pub has_implicit_id: bool,
    pub has_implicit_tid: bool,
    pub has_implicit_tname: bool,
}

/// View over a [`Typedesc`] plus the implicit-field flags in effect for the
/// current query, handed to `Queryable::check_descriptor`/`QueryResult::prepare`.
pub struct DescriptorContext<'a> {
    pub(crate) typedesc: &'a Typedesc,
    pub has_implicit_id: bool,
    pub has_implicit_tid: bool,
    pub has_implicit_tname: bool,
}

impl Typedesc {
    /// Builds the [`DescriptorContext`] a [`crate::QueryResult`] impl
    /// validates its shape against.
    pub fn as_queryable_context(&self) -> DescriptorContext<'_> {
        DescriptorContext::new(self)
    }
}

impl<'a> DescriptorContext<'a> {
    pub fn new(typedesc: &'a Typedesc) -> DescriptorContext<'a> {
        DescriptorContext {
            typedesc,
            has_implicit_id: false,
            has_implicit_tid: false,
            has_implicit_tname: false,
        }
    }

    pub fn descriptor(&self, pos: TypePos) -> Result<&'a Descriptor, CodecError> {
        self.typedesc.get(pos)
    }

    /// Builds the dynamic [`Codec`] for the descriptor at `pos` (the
    /// [`crate::value::Value`] fallback implementation's entry point).
    pub fn build_codec(&self, pos: TypePos) -> Result<Arc<dyn Codec>, Error> {
        codec::build_codec(self.typedesc, pos).map_err(DescriptorMismatch::with_source)
    }
}

/// Implemented by compile-time-typed host values that can both validate a
/// descriptor shape ahead of time and decode a `Data` message against it.
pub trait Queryable: Sized {
    type Args;

    fn check_descriptor(
        ctx: &DescriptorContext,
        root_pos: TypePos,
    ) -> Result<Self::Args, CodecError>;

    fn decode(decoder: &Decoder, args: &Self::Args, buf: &Bytes) -> Result<Self, DecodeError>;
}
