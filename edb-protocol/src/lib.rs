/*!
Low-level protocol implementation for a Gel-compatible database client.
For applications, use `edb-client`.

This crate implements the binary wire protocol only: message framing,
descriptor decoding, the codec engine, and the argument/result traits that
let a compile-time-typed host value participate in it. It knows nothing
about sockets, connection pooling, or retries; those live in `edb-client`.
*/

pub mod annotations;
pub mod buffer;
pub mod client_message;
pub mod codec;
pub mod common;
pub mod descriptors;
pub mod encoding;
pub mod enums;
pub mod errors;
pub mod features;
pub mod model;
pub mod query_arg;
pub mod query_result;
pub mod queryable;
pub mod server_message;
pub mod value;

pub use query_result::QueryResult;
pub use queryable::Queryable;
pub use value::Value;
