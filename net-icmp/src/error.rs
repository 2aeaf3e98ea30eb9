//! The error taxonomy for the probe loop, per §7.

use std::fmt;
use std::io;

use net_dialer::{DialError, ResolveError};

/// Everything that can go wrong running `count` echo probes against a
/// host. No retries at any layer: every variant is fatal to the
/// current `ping` invocation.
#[derive(Debug)]
pub enum ProbeError {
    /// Could not discover the host's own outbound address.
    ResolveSource { source: ResolveError },
    /// Could not resolve the target host to an address.
    ResolveDestination { host: String, source: ResolveError },
    /// Could not open a raw socket to the destination for probe `seq`.
    Dial {
        host: String,
        seq: u16,
        source: DialError,
    },
    /// A write or read on an open socket returned an OS error.
    Io {
        host: String,
        seq: u16,
        source: io::Error,
    },
    /// The echo reply was too short to contain an IP header and an
    /// ICMP header (28 octets).
    ReplyTooShort { host: String, seq: u16, len: usize },
    /// `host` resolved only to an IPv6 address. The wire transport is
    /// IPv4-only (§1 Non-goals), so there is no raw socket this prober
    /// can send the probe over.
    Ipv6Unsupported { host: String },
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // `ResolveError`'s own `Display` already carries the
            // "error resolving {source,destination} address" prefix
            // (§4.7), so this just forwards it rather than doubling
            // it up.
            ProbeError::ResolveSource { source } => write!(f, "{source}"),
            ProbeError::ResolveDestination { source, .. } => write!(f, "{source}"),
            ProbeError::Dial { host, seq, source } => {
                write!(f, "error establishing connection with {host} (seq {seq}): {source}")
            }
            ProbeError::Io { host, seq, source } => {
                write!(f, "error exchanging ICMP echo with {host} (seq {seq}): {source}")
            }
            ProbeError::ReplyTooShort { host, seq, len } => {
                write!(
                    f,
                    "echo reply from {host} (seq {seq}) was only {len} octets, expected at least 28"
                )
            }
            ProbeError::Ipv6Unsupported { host } => {
                write!(f, "{host} resolved to an IPv6 address, but the ICMP prober is IPv4-only")
            }
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::ResolveSource { source } | ProbeError::ResolveDestination { source, .. } => {
                Some(source)
            }
            ProbeError::Dial { source, .. } => Some(source),
            ProbeError::Io { source, .. } => Some(source),
            ProbeError::ReplyTooShort { .. } | ProbeError::Ipv6Unsupported { .. } => None,
        }
    }
}
