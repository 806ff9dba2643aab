//! The hierarchical, tag-bearing error taxonomy shared by every crate in the
//! workspace. Every leaf type here (`ClientConnectionClosedError`,
`TransactionConflictError`,...) is a zero-sized marker implementing
//! [`ErrorKind`]; building one produces the single user-visible [`Error`]
//! type that every public API in the workspace returns.

mod error;
pub mod fields;
mod kinds;
mod traits;

#[cfg(feature = "miette")]
mod miette;

#[cfg(test)]
mod tests;

pub use error::{Error, Field, Tag};
pub use kinds::*;
pub use traits::ErrorKind;

/// Fold a lower-level `std::error::Error` (e.g. `std::io::Error`) into the
/// given client-error kind. Convenience used throughout `edb-client`.
pub fn wrap<K: ErrorKind, S: std::error::Error + Send + Sync + 'static>(source: S) -> Error {
    K::with_source(source)
}
