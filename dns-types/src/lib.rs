//! Wire types and codec for the subset of the DNS message format that
//! `npctl` needs to walk the authoritative hierarchy: header, question,
//! and A/AAAA/NS/CNAME resource records, with label-compression support
//! on the read path.

#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

pub mod protocol;
