//! Thin facade over the buffer/annotation types, kept as its own module so
//! callers don't need to know that `Input`/`Output` live in `buffer` and
//! `Annotations` lives in `annotations`.

pub use crate::annotations::{Annotations, KeyValues};
pub use crate::buffer::{Decode, Encode, Input, Output};
