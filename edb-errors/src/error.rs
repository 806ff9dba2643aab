use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::kinds::{error_name, tag_check};
use crate::traits::{ErrorKind, Sealed};

/// A bit position in the per-error-code tag mask (see `kinds.rs`).
///
/// Tags are queried, never combined by the caller: `error.has_tag(&SHOULD_RETRY)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub(crate) bit: u32,
}

/// A field that can be attached to an [`Error`] with [`Error::set`] and read
/// back with [`Error::get`]. Implementors are zero-sized marker types; the
/// associated `Value` carries the payload (see the `fields` module, e.g.
/// `QueryText`, `Description`).
pub trait Field: 'static {
    type Value: Send + Sync + 'static;
}

type FieldMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// The single user-visible error type for the public API.
pub struct Error {
    code: u32,
    message: Option<String>,
    source: Option<Arc<dyn StdError + Send + Sync>>,
    fields: FieldMap,
}

impl Error {
    pub(crate) fn new<K: Sealed + ?Sized>() -> Self {
        Error {
            code: K::CODE,
            message: None,
            source: None,
            fields: HashMap::new(),
        }
    }

    /// Builds an error from a raw numeric code, bypassing the sealed
    /// `ErrorKind` list. Used to decode a server `ErrorResponse`'s `code`
    /// field, whose leaf codes outnumber the kinds named in this crate.
    pub fn from_code(code: u32, message: impl Into<String>) -> Self {
        Error {
            code,
            message: Some(message.into()),
            source: None,
            fields: HashMap::new(),
        }
    }

    /// The 32-bit server/client error code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Human-readable name of the most specific kind this error was built
    /// with, e.g. `"ClientConnectionClosedError"`.
    pub fn kind_name(&self) -> &'static str {
        error_name(self.code)
    }

    /// True if this error (or an ancestor category sharing its tag bits) was
    /// tagged with `tag`.
    pub fn has_tag(&self, tag: &Tag) -> bool {
        tag_check(self.code, tag.bit)
    }

    /// True if this error was built from exactly the kind `K` (or any kind
    /// sharing the same numeric code — the taxonomy does not disambiguate
    /// beyond the code).
    pub fn is<K: ErrorKind>(&self) -> bool {
        self.code == K::CODE
    }

    pub fn context(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn source<S: StdError + Send + Sync + 'static>(mut self, source: S) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Attach a field, returning `self` for chaining, e.g.
    /// `e.set::<QueryText>(query)`.
    pub fn set<F: Field>(mut self, value: impl Into<F::Value>) -> Self {
        self.fields.insert(TypeId::of::<F>(), Box::new(value.into()));
        self
    }

    pub fn get<F: Field>(&self) -> Option<&F::Value> {
        self.fields
            .get(&TypeId::of::<F>())
            .and_then(|v| v.downcast_ref::<F::Value>())
    }

    pub fn details(&self) -> Option<String> {
        self.message.clone()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind_name())
            .field("code", &format_args!("{:#010x}", self.code))
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind_name())?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(src) = &self.source {
            write!(f, ": {src}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn StdError + 'static))
    }
}
