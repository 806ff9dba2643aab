use crate::error::Error;

/// Sealed so that only the kinds generated in [`crate::kinds`] can implement
/// [`ErrorKind`]: a private `Sealed` trait holding the numeric identity, and
/// a public-facing `ErrorKind` trait holding the builder methods.
pub(crate) trait Sealed {
    const CODE: u32;
    const NAME: &'static str;
    const TAGS: u32;
}

/// A marker for one leaf (or branch) of the error taxonomy.
///
/// Every concrete kind (`InternalServerError`, `ClientConnectionClosedError`,
/// ...) implements this trait and can therefore be used both to build a new
/// [`Error`] and to test an existing one with [`Error::is`].
pub trait ErrorKind: Sealed {
    fn build() -> Error {
        Error::new::<Self>()
    }

    fn with_message(msg: impl Into<String>) -> Error {
        Error::new::<Self>().context(msg.into())
    }

    fn with_source<S: std::error::Error + Send + Sync + 'static>(source: S) -> Error {
        Error::new::<Self>().source(source)
    }
}

impl<T: Sealed> ErrorKind for T {}
