//! The error taxonomy for the iterative walk, per §7.

use std::fmt;
use std::io;

use dns_types::protocol::{deserialise, serialise};
use net_dialer::DialError;

/// Everything that can go wrong resolving a hostname.  No retries at
/// any layer (§4.3 Failure handling): every variant here is fatal to
/// the current `resolve` call, propagated with one line of context at
/// each level the way the original wraps errors with
/// `errors.Wrapf`.
#[derive(Debug)]
pub enum ResolutionError {
    /// `host` could not be encoded as a `DomainName` (too long, an
    /// empty label, a non-ASCII octet).
    InvalidHostname { host: String },
    /// The binary codec rejected an outbound query (should be
    /// unreachable for well-formed hostnames).
    Serialization {
        host: String,
        source: serialise::Error,
    },
    /// Could not open a socket to the next nameserver.
    Dial {
        nameserver: String,
        source: DialError,
    },
    /// A write or read on an open socket returned an OS error.
    Io {
        nameserver: String,
        source: io::Error,
    },
    /// The reply could not be parsed: too short, a bad pointer, an
    /// RDLENGTH that overruns the message.
    MalformedReply {
        nameserver: String,
        source: deserialise::Error,
    },
    /// The referral graph bottomed out without an answer, glue, or
    /// NS record to follow.
    ResolutionExhausted { host: String },
    /// The shared CNAME-chase / NS-recursion depth counter (§9 Open
    /// Question 4) hit zero.
    RecursionLimit { host: String },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::InvalidHostname { host } => {
                write!(f, "'{host}' is not a valid hostname")
            }
            ResolutionError::Serialization { host, source } => {
                write!(f, "error serialising DNS message for {host}: {source}")
            }
            ResolutionError::Dial { nameserver, source } => {
                write!(f, "error dialing nameserver {nameserver}: {source}")
            }
            ResolutionError::Io { nameserver, source } => {
                write!(f, "error querying nameserver {nameserver}: {source}")
            }
            ResolutionError::MalformedReply { nameserver, source } => {
                write!(f, "malformed reply from {nameserver}: {source}")
            }
            ResolutionError::ResolutionExhausted { host } => {
                write!(f, "failed to resolve address of host: {host}")
            }
            ResolutionError::RecursionLimit { host } => {
                write!(f, "too many CNAME/NS referrals resolving {host}")
            }
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolutionError::InvalidHostname { .. }
            | ResolutionError::ResolutionExhausted { .. }
            | ResolutionError::RecursionLimit { .. } => None,
            ResolutionError::Serialization { source, .. } => Some(source),
            ResolutionError::Dial { source, .. } => Some(source),
            ResolutionError::Io { source, .. } => Some(source),
            ResolutionError::MalformedReply { source, .. } => Some(source),
        }
    }
}
