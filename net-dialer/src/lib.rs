//! Socket-opening and address-resolution capabilities shared by the
//! `dig` and `ping` front ends.
//!
//! Neither the DNS resolver nor the ICMP prober open sockets
//! directly: both go through a [`Dialer`], and both discover the
//! addresses they operate on through an [`AddressResolver`].  This
//! crate owns those two traits plus the "real" implementations that
//! actually touch the network; mocked implementations for tests live
//! alongside them, gated behind the `test-util` feature, the way
//! `dns-types::protocol::types::test_util` does.

#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

pub mod dialer;
pub mod resolver;

pub use dialer::{Connection, DialError, Dialer, Network, RealDialer};
pub use resolver::{resolve_source_via, AddressResolver, LocalResolver, ResolveError};
