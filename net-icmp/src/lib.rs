//! Hand-built ICMP echo / IPv4 packet fabrication and the raw-socket
//! probe loop `ping` drives (§4.4, §4.5). Shares the [`net_dialer`]
//! crate's `Dialer` and `AddressResolver` capabilities with the
//! DNS resolver rather than reimplementing either.

#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

pub mod checksum;
pub mod error;
pub mod icmp;
pub mod ipv4;
pub mod probe;

pub use error::ProbeError;
pub use probe::{Pinger, ProbeOutcome};
