//! The DNS message format, RFC 1035 section 4.

pub mod deserialise;
pub mod serialise;
pub mod types;

pub use types::*;
