//! An iterative DNS resolver, stepping from a root nameserver down to
//! an authoritative answer without ever consulting the host OS
//! resolver or a cache. See the root-to-authority walk in
//! [`resolver::Resolver`], and [`native::NativeResolver`] for the
//! adapter that lets `ping` use this resolver instead of the OS's.

#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

pub mod error;
pub mod native;
pub mod resolver;
pub mod roots;

pub use error::ResolutionError;
pub use native::NativeResolver;
pub use resolver::{Resolver, RECURSION_LIMIT};
