//! The descriptor decoder: turns a `CommandDataDescription`
//! blob into an in-memory tree of [`Descriptor`] nodes, content-addressed by
//! a 16-byte server id. Two wire eras exist; `decode` dispatches on
//! [`ProtocolVersion`] and the modern (2.0+) "compact" layout, with
//! ancestor chains and per-element flags, is what every fixture in
//! `tests/type_descriptors.rs` exercises.

use std::collections::HashMap;

use uuid::Uuid;

use crate::buffer::{Decode, Input};
use crate::common::Capabilities;
use crate::enums::Cardinality;
use crate::errors::{self, CodecError, DecodeError};

/// Index of a descriptor within the flat array decoded from one blob —
/// descriptors reference each other by position, not by id, on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypePos(pub u16);

impl From<u16> for TypePos {
    fn from(v: u16) -> TypePos {
        TypePos(v)
    }
}

/// Sentinel written by the server for an absent `TypePos` reference.
const NO_POS: u16 = 0xFFFF;

fn pop_type_pos(buf: &mut Input) -> Result<TypePos, DecodeError> {
    Ok(TypePos(buf.pop_u16()?))
}

fn pop_optional_type_pos(buf: &mut Input) -> Result<Option<TypePos>, DecodeError> {
    let v = buf.pop_u16()?;
    Ok(if v == NO_POS { None } else { Some(TypePos(v)) })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDescriptor {
    pub id: Uuid,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseScalarTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
    pub base_type_pos: Option<TypePos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
    pub element_types: Vec<TypePos>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTupleElement {
    pub name: String,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTupleTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
    pub elements: Vec<NamedTupleElement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
    pub type_pos: TypePos,
    pub dimensions: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeElement {
    pub flag_implicit: bool,
    pub flag_link_property: bool,
    pub flag_link: bool,
    pub cardinality: Option<Cardinality>,
    pub name: String,
    pub type_pos: TypePos,
    pub source_type_pos: Option<TypePos>,
}

const FLAG_IMPLICIT: u32 = 1 << 0;
const FLAG_LINK_PROPERTY: u32 = 1 << 1;
const FLAG_LINK: u32 = 1 << 2;

impl ShapeElement {
    fn decode(buf: &mut Input, with_source: bool) -> Result<ShapeElement, DecodeError> {
        let flags = buf.pop_u32()?;
        let cardinality_byte = buf.pop_u8()?;
        let cardinality = if cardinality_byte == 0 {
            None
        } else {
            Some(Cardinality::try_from(cardinality_byte)?)
        };
        let name = buf.pop_string()?;
        let type_pos = pop_type_pos(buf)?;
        let source_type_pos = if with_source {
            pop_optional_type_pos(buf)?
        } else {
            None
        };
        Ok(ShapeElement {
            flag_implicit: flags & FLAG_IMPLICIT != 0,
            flag_link_property: flags & FLAG_LINK_PROPERTY != 0,
            flag_link: flags & FLAG_LINK != 0,
            cardinality,
            name,
            type_pos,
            source_type_pos,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectShapeDescriptor {
    pub id: Uuid,
    pub ephemeral_free_shape: bool,
    pub type_pos: Option<TypePos>,
    pub elements: Vec<ShapeElement>,
}

impl ObjectShapeDescriptor {
    fn decode(buf: &mut Input, id: Uuid, with_source: bool) -> Result<Self, DecodeError> {
        let ephemeral_free_shape = buf.pop_u8()? != 0;
        let type_pos = pop_optional_type_pos(buf)?;
        let count = buf.pop_u16()?;
        let mut elements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            elements.push(ShapeElement::decode(buf, with_source)?);
        }
        Ok(ObjectShapeDescriptor {
            id,
            ephemeral_free_shape,
            type_pos,
            elements,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
    pub type_pos: TypePos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiRangeTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
    pub type_pos: TypePos,
}

/// A union or intersection of object types (`Compound{Union,Intersection}TypeDescriptor`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundTypeDescriptor {
    pub id: Uuid,
    pub name: Option<String>,
    pub schema_defined: Option<bool>,
    pub ancestors: Vec<TypePos>,
    pub union_of: Vec<TypePos>,
    pub is_intersection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Descriptor {
    Set(SetDescriptor),
    ObjectShape(ObjectShapeDescriptor),
    BaseScalar(BaseScalarTypeDescriptor),
    Scalar(ScalarTypeDescriptor),
    Tuple(TupleTypeDescriptor),
    NamedTuple(NamedTupleTypeDescriptor),
    Array(ArrayTypeDescriptor),
    Enum(EnumTypeDescriptor),
    Object(ObjectTypeDescriptor),
    Compound(CompoundTypeDescriptor),
    Range(RangeTypeDescriptor),
    MultiRange(MultiRangeTypeDescriptor),
    /// Input shape: same wire layout as an output object shape.
    InputShape(ObjectShapeDescriptor),
    /// SQL-language result row; carries the same shape layout as `Object`.
    SQLRow(ObjectShapeDescriptor),
}

mod tag {
    pub const SET: u8 = 0;
    pub const OBJECT_SHAPE: u8 = 1;
    pub const BASE_SCALAR: u8 = 2;
    pub const SCALAR: u8 = 3;
    pub const TUPLE: u8 = 4;
    pub const NAMED_TUPLE: u8 = 5;
    pub const ARRAY: u8 = 6;
    pub const ENUM: u8 = 7;
    pub const INPUT_SHAPE: u8 = 8;
    pub const RANGE: u8 = 9;
    pub const OBJECT: u8 = 10;
    pub const COMPOUND: u8 = 11;
    pub const MULTIRANGE: u8 = 12;
    pub const SQL_ROW: u8 = 13;
}

fn pop_named_header(
    buf: &mut Input,
) -> Result<(Option<String>, Option<bool>, Vec<TypePos>), DecodeError> {
    let name = buf.pop_string()?;
    let name = if name.is_empty() { None } else { Some(name) };
    let schema_defined = buf.pop_u8()? != 0;
    let ancestor_count = buf.pop_u16()?;
    let mut ancestors = Vec::with_capacity(ancestor_count as usize);
    for _ in 0..ancestor_count {
        ancestors.push(pop_type_pos(buf)?);
    }
    Ok((name, Some(schema_defined), ancestors))
}

impl Descriptor {
    pub fn decode(buf: &mut Input) -> Result<Descriptor, DecodeError> {
        let _len = buf.pop_u32()?;
        let tag_byte = buf.pop_u8()?;
        let id = buf.pop_uuid()?;
        Ok(match tag_byte {
            tag::SET => Descriptor::Set(SetDescriptor {
                id,
                type_pos: pop_type_pos(buf)?,
            }),
            tag::OBJECT_SHAPE => Descriptor::ObjectShape(ObjectShapeDescriptor::decode(
                buf, id, true,
            )?),
            tag::BASE_SCALAR => {
                let name = buf.pop_string()?;
                Descriptor::BaseScalar(BaseScalarTypeDescriptor {
                    id,
                    name: if name.is_empty() { None } else { Some(name) },
                })
            }
            tag::SCALAR => {
                let (name, schema_defined, ancestors) = pop_named_header(buf)?;
                let base_type_pos = ancestors.last().copied();
                Descriptor::Scalar(ScalarTypeDescriptor {
                    id,
                    name,
                    schema_defined,
                    ancestors,
                    base_type_pos,
                })
            }
            tag::TUPLE => {
                let (name, schema_defined, ancestors) = pop_named_header(buf)?;
                let count = buf.pop_u32()?;
                let mut element_types = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    element_types.push(pop_type_pos(buf)?);
                }
                Descriptor::Tuple(TupleTypeDescriptor {
                    id,
                    name,
                    schema_defined,
                    ancestors,
                    element_types,
                })
            }
            tag::NAMED_TUPLE => {
                let (name, schema_defined, ancestors) = pop_named_header(buf)?;
                let count = buf.pop_u32()?;
                let mut elements = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name = buf.pop_string()?;
                    let type_pos = pop_type_pos(buf)?;
                    elements.push(NamedTupleElement { name, type_pos });
                }
                Descriptor::NamedTuple(NamedTupleTypeDescriptor {
                    id,
                    name,
                    schema_defined,
                    ancestors,
                    elements,
                })
            }
            tag::ARRAY => {
                let (name, schema_defined, ancestors) = pop_named_header(buf)?;
                let type_pos = pop_type_pos(buf)?;
                let ndims = buf.pop_u16()?;
                let mut dimensions = Vec::with_capacity(ndims as usize);
                for _ in 0..ndims {
                    dimensions.push(buf.pop_i32()?);
                }
                Descriptor::Array(ArrayTypeDescriptor {
                    id,
                    name,
                    schema_defined,
                    ancestors,
                    type_pos,
                    dimensions,
                })
            }
            tag::ENUM => {
                let (name, schema_defined, ancestors) = pop_named_header(buf)?;
                let count = buf.pop_u16()?;
                let mut members = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    members.push(buf.pop_string()?);
                }
                Descriptor::Enum(EnumTypeDescriptor {
                    id,
                    name,
                    schema_defined,
                    ancestors,
                    members,
                })
            }
            tag::INPUT_SHAPE => {
                Descriptor::InputShape(ObjectShapeDescriptor::decode(buf, id, false)?)
            }
            tag::RANGE => {
                let (name, schema_defined, ancestors) = pop_named_header(buf)?;
                let type_pos = pop_type_pos(buf)?;
                Descriptor::Range(RangeTypeDescriptor {
                    id,
                    name,
                    schema_defined,
                    ancestors,
                    type_pos,
                })
            }
            tag::OBJECT => {
                let name = buf.pop_string()?;
                let schema_defined = buf.pop_u8()? != 0;
                Descriptor::Object(ObjectTypeDescriptor {
                    id,
                    name: if name.is_empty() { None } else { Some(name) },
                    schema_defined: Some(schema_defined),
                })
            }
            tag::COMPOUND => {
                let (name, schema_defined, ancestors) = pop_named_header(buf)?;
                let op = buf.pop_u8()?;
                let count = buf.pop_u16()?;
                let mut union_of = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    union_of.push(pop_type_pos(buf)?);
                }
                Descriptor::Compound(CompoundTypeDescriptor {
                    id,
                    name,
                    schema_defined,
                    ancestors,
                    union_of,
                    is_intersection: op != 0,
                })
            }
            tag::MULTIRANGE => {
                let (name, schema_defined, ancestors) = pop_named_header(buf)?;
                let type_pos = pop_type_pos(buf)?;
                Descriptor::MultiRange(MultiRangeTypeDescriptor {
                    id,
                    name,
                    schema_defined,
                    ancestors,
                    type_pos,
                })
            }
            tag::SQL_ROW => Descriptor::SQLRow(ObjectShapeDescriptor::decode(buf, id, true)?),
            _ => return errors::InvalidTypeDescriptor { descriptor: tag_byte }.fail(),
        })
    }

    pub fn id(&self) -> Uuid {
        use Descriptor::*;
        match self {
            Set(d) => d.id,
            ObjectShape(d) | InputShape(d) | SQLRow(d) => d.id,
            BaseScalar(d) => d.id,
            Scalar(d) => d.id,
            Tuple(d) => d.id,
            NamedTuple(d) => d.id,
            Array(d) => d.id,
            Enum(d) => d.id,
            Object(d) => d.id,
            Compound(d) => d.id,
            Range(d) => d.id,
            MultiRange(d) => d.id,
        }
    }
}

/// A decoded descriptor blob: the flat array in wire order plus an id
/// index, exactly as stored in the process-wide descriptor cache.
#[derive(Debug, Clone)]
pub struct Typedesc {
    pub(crate) proto: crate::features::ProtocolVersion,
    pub(crate) root_id: Uuid,
    pub(crate) array: Vec<Descriptor>,
    pub(crate) by_id: HashMap<Uuid, TypePos>,
}

impl Typedesc {
    /// Decodes the full flat array from `input` and records `id` as the
    /// overall blob id.
    pub fn decode_with_id(id: Uuid, input: &mut Input) -> Result<Typedesc, DecodeError> {
        let proto = *input.proto();
        let mut array = Vec::new();
        let mut by_id = HashMap::new();
        while input.remaining() > 0 {
            let desc = Descriptor::decode(input)?;
            by_id.insert(desc.id(), TypePos(array.len() as u16));
            array.push(desc);
        }
        Ok(Typedesc {
            proto,
            root_id: id,
            array,
            by_id,
        })
    }

    pub fn root_id(&self) -> Uuid {
        self.root_id
    }

    pub fn id(&self) -> &Uuid {
        &self.root_id
    }

    pub fn get(&self, pos: TypePos) -> Result<&Descriptor, CodecError> {
        self.array
            .get(pos.0 as usize)
            .ok_or(errors::UnexpectedTypePos { position: pos.0 }.build())
    }

    pub fn get_by_id(&self, id: Uuid) -> Result<&Descriptor, CodecError> {
        let pos = *self
            .by_id
            .get(&id)
            .ok_or_else(|| errors::UndefinedBaseScalar { uuid: id }.build())?;
        self.get(pos)
    }

    /// The root descriptor: either an empty tree (`NoResult`) or the last
    /// entry decoded, matching the wire convention that the top-level shape
    /// is appended last.
    pub fn root(&self) -> Option<&Descriptor> {
        self.array.last()
    }

    pub fn root_pos(&self) -> Option<TypePos> {
        if self.array.is_empty() {
            None
        } else {
            Some(TypePos((self.array.len() - 1) as u16))
        }
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.array
    }
}

/// Capabilities carried alongside a `CommandDataDescription` —
/// threaded through cache invalidation in `edb-client::caches`.
pub fn describes_ddl(capabilities: Capabilities) -> bool {
    capabilities.contains(Capabilities::DDL)
}
