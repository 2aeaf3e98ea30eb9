//! The address-resolution capability shared by `dig` and `ping`:
//! "what's my own outbound address" and "what's the address of this
//! hostname", the latter either delegated to the OS or — for
//! `NativeResolver`, defined in the `dns-resolver` crate so it can
//! depend on the iterative walk without creating a cycle here —
//! answered by walking the DNS hierarchy from scratch.

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::net::IpAddr;

use crate::dialer::{Dialer, Network};

/// Errors encountered while resolving a source or destination
/// address.
#[derive(Debug)]
pub enum ResolveError {
    /// Could not discover the kernel-selected outbound address.
    Source(io::Error),
    /// The OS resolver (`LocalResolver` only) failed to look up a
    /// hostname.
    NameService { host: String, source: io::Error },
    /// The OS resolver returned no addresses for an otherwise
    /// successful lookup.
    NoAddresses { host: String },
    /// `NativeResolver`'s own iterative walk (`dns-resolver`) failed.
    /// Boxed rather than a concrete type, since that crate depends on
    /// this one and can't be named here without a cycle.
    Resolution {
        host: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Source(source) => {
                write!(f, "error resolving source address: {source}")
            }
            ResolveError::NameService { host, source } => {
                write!(f, "error resolving destination address for {host}: {source}")
            }
            ResolveError::NoAddresses { host } => {
                write!(f, "no addresses found for {host}")
            }
            ResolveError::Resolution { host, source } => {
                write!(f, "error resolving destination address for {host}: {source}")
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Source(source) | ResolveError::NameService { source, .. } => Some(source),
            ResolveError::NoAddresses { .. } => None,
            ResolveError::Resolution { source, .. } => Some(source.as_ref()),
        }
    }
}

/// `ResolveSource`/`ResolveDestination`, polymorphic over
/// `{LocalResolver, NativeResolver}` per §4.7.  A capability set, not
/// a class hierarchy.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Discover the address this host would use to reach the public
    /// internet, by opening a UDP "connection" to a well-known
    /// address and reading back the kernel's choice of local
    /// address.  No packets are actually sent.
    async fn resolve_source(&self) -> Result<IpAddr, ResolveError>;

    /// Resolve `host` to an address.
    async fn resolve_destination(&self, host: &str) -> Result<IpAddr, ResolveError>;
}

/// The address used for outbound-address discovery.  It doesn't need
/// to be reachable, or even exist: UDP has no handshake, so
/// `connect`-ing to it just asks the kernel to pick a route (and
/// hence a local address) without sending anything.
const OUTBOUND_PROBE_ADDRESS: &str = "8.8.8.8:80";

/// Discovers the outbound source address the same way for any
/// `AddressResolver`: open a UDP socket via the given [`Dialer`],
/// connected to [`OUTBOUND_PROBE_ADDRESS`], and read back its local
/// address.
pub async fn resolve_source_via(dialer: &dyn Dialer) -> Result<IpAddr, ResolveError> {
    let conn = dialer
        .dial(Network::Udp, OUTBOUND_PROBE_ADDRESS)
        .await
        .map_err(|err| ResolveError::Source(io::Error::new(io::ErrorKind::Other, err)))?;

    conn.local_addr().map_err(ResolveError::Source)
}

/// Delegates destination resolution to the operating system's own
/// resolver (`getaddrinfo`-style lookup via `tokio::net::lookup_host`).
/// Source-address discovery is identical across resolver kinds, so it
/// goes through the same real [`Dialer`].
pub struct LocalResolver<D: Dialer> {
    dialer: D,
}

impl<D: Dialer> LocalResolver<D> {
    pub fn new(dialer: D) -> Self {
        Self { dialer }
    }
}

#[async_trait]
impl<D: Dialer> AddressResolver for LocalResolver<D> {
    async fn resolve_source(&self) -> Result<IpAddr, ResolveError> {
        resolve_source_via(&self.dialer).await
    }

    async fn resolve_destination(&self, host: &str) -> Result<IpAddr, ResolveError> {
        let lookup_target = format!("{host}:0");
        let mut addrs = tokio::net::lookup_host(&lookup_target)
            .await
            .map_err(|source| ResolveError::NameService {
                host: host.to_string(),
                source,
            })?;

        addrs
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| ResolveError::NoAddresses {
                host: host.to_string(),
            })
    }
}

#[cfg(any(feature = "test-util", test))]
pub mod test_util {
    use super::*;

    /// An [`AddressResolver`] that hands back fixed, pre-scripted
    /// addresses (or a pre-scripted failure) rather than touching a
    /// dialer or the OS resolver at all. Used by callers like
    /// `net-icmp`'s probe loop tests, which only care about what the
    /// prober does once it has a source and destination, not how
    /// those were obtained.
    pub struct MockAddressResolver {
        source: Result<IpAddr, String>,
        destination: Result<IpAddr, String>,
    }

    impl MockAddressResolver {
        /// Always resolves both source and destination to the given
        /// addresses.
        pub fn fixed(source: IpAddr, destination: IpAddr) -> Self {
            Self {
                source: Ok(source),
                destination: Ok(destination),
            }
        }

        /// Fails source resolution; destination resolution is never
        /// exercised by a caller that checks source first.
        pub fn source_error() -> Self {
            Self {
                source: Err("mocked source resolution failure".to_string()),
                destination: Ok(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)),
            }
        }
    }

    #[async_trait]
    impl AddressResolver for MockAddressResolver {
        async fn resolve_source(&self) -> Result<IpAddr, ResolveError> {
            self.source
                .clone()
                .map_err(|message| ResolveError::Source(io::Error::new(io::ErrorKind::Other, message)))
        }

        async fn resolve_destination(&self, host: &str) -> Result<IpAddr, ResolveError> {
            self.destination.clone().map_err(|message| ResolveError::NameService {
                host: host.to_string(),
                source: io::Error::new(io::ErrorKind::Other, message),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialer::test_util::{MockConnection, MockDialer};
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn resolve_source_via_reads_back_local_addr() {
        let expected = IpAddr::V4(Ipv4Addr::new(192, 168, 0, 7));
        let dialer = MockDialer::new(vec![Ok(MockConnection::new(expected, vec![]))]);

        let got = resolve_source_via(&dialer).await.unwrap();
        assert_eq!(expected, got);
        assert_eq!(
            vec![(Network::Udp, OUTBOUND_PROBE_ADDRESS.to_string())],
            dialer.dialed_addresses(),
        );
    }
}
