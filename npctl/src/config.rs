//! Per-invocation configuration (§9 Design Notes "Process-wide
//! state"): the original tool kept `resolverType`/`pingCount` as
//! package-level variables; here they're just fields threaded through
//! from parsed CLI flags instead.

use std::fmt;

/// Which [`net_dialer::AddressResolver`] backs hostname resolution.
#[derive(Debug, Clone, Copy, Eq, PartialEq, clap::ValueEnum)]
#[allow(clippy::module_name_repetitions)]
pub enum ResolverKind {
    /// Walk the DNS hierarchy from a root server, ignoring the host
    /// OS's resolver entirely.
    Native,
    /// Delegate to the operating system (`getaddrinfo`).
    Local,
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverKind::Native => write!(f, "native"),
            ResolverKind::Local => write!(f, "local"),
        }
    }
}

/// How many echo requests `ping` sends per invocation.
pub const DEFAULT_PING_COUNT: u16 = 3;
