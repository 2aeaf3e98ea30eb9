//! The connected-socket factory used by both utilities.
//!
//! `dig` dials UDP to a nameserver; `ping` dials a raw `ip4:icmp`
//! socket to the destination host, and also dials a throwaway UDP
//! "connection" (no packets ever leave the host) purely to read back
//! the kernel's choice of outbound address.  Both cases are opening a
//! connected, byte-oriented channel, so they share one small
//! abstraction rather than each utility reaching for `tokio::net`
//! directly.

use async_trait::async_trait;
use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Per-operation socket deadline (§5: "Implementations SHOULD add a
/// per-operation timeout (suggested default: 5 s) as an enhancement
/// without changing the observed successful behavior"), grounded in
/// the teacher's own `query_nameserver_udp`/`query_nameserver_tcp`,
/// each of which wraps a single round-trip in `tokio::time::timeout`
/// with the same 5s figure.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(5);

/// Which kind of socket to open.  Named after the two `net.Dial`
/// network strings the original tool used (`"udp"` and
/// `"ip4:icmp"`), since that's the shape callers think in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Network {
    Udp,
    RawIcmp,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Udp => write!(f, "udp"),
            Network::RawIcmp => write!(f, "ip4:icmp"),
        }
    }
}

/// A connected channel: write a datagram, read a datagram, find out
/// which local address it's bound to.  Closed on drop — there is no
/// explicit `close`, Rust's RAII does the job the original's
/// `defer conn.Close()` did by hand.
#[async_trait]
pub trait Connection: Send {
    async fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;
    async fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;
    fn local_addr(&self) -> io::Result<IpAddr>;
}

/// A [`Connection`] backed by a real OS socket, UDP or raw ICMP
/// alike — once connected, both are just "write bytes, read bytes"
/// to tokio.
pub struct SocketConnection {
    socket: UdpSocket,
}

#[async_trait]
impl Connection for SocketConnection {
    async fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        timeout(SOCKET_TIMEOUT, self.socket.send(bytes))
            .await
            .unwrap_or_else(|_| Err(timed_out()))
    }

    async fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        timeout(SOCKET_TIMEOUT, self.socket.recv(buffer))
            .await
            .unwrap_or_else(|_| Err(timed_out()))
    }

    fn local_addr(&self) -> io::Result<IpAddr> {
        self.socket.local_addr().map(|addr| addr.ip())
    }
}

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "socket operation timed out")
}

/// Errors encountered while opening a connection.
#[derive(Debug)]
pub enum DialError {
    /// `address` could not be parsed for the given `network`.
    AddressInvalid { network: Network, address: String },
    /// The underlying OS call (bind/connect) failed.
    Connect {
        network: Network,
        address: String,
        source: io::Error,
    },
}

impl fmt::Display for DialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialError::AddressInvalid { network, address } => {
                write!(f, "invalid {network} address '{address}'")
            }
            DialError::Connect {
                network,
                address,
                source,
            } => write!(f, "error dialing {network} {address}: {source}"),
        }
    }
}

impl std::error::Error for DialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DialError::AddressInvalid { .. } => None,
            DialError::Connect { source, .. } => Some(source),
        }
    }
}

/// Capability to open a connected socket.  A capability set, not a
/// class hierarchy: the real implementation and the test mock both
/// just implement this trait.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, network: Network, address: &str) -> Result<Box<dyn Connection>, DialError>;
}

/// The real `Dialer`, backed by actual kernel sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealDialer;

#[async_trait]
impl Dialer for RealDialer {
    async fn dial(
        &self,
        network: Network,
        address: &str,
    ) -> Result<Box<dyn Connection>, DialError> {
        match network {
            Network::Udp => dial_udp(address).await,
            Network::RawIcmp => dial_raw_icmp(address).await,
        }
    }
}

async fn dial_udp(address: &str) -> Result<Box<dyn Connection>, DialError> {
    let target: SocketAddr = address
        .parse()
        .map_err(|_| DialError::AddressInvalid {
            network: Network::Udp,
            address: address.to_string(),
        })?;

    let bind_addr: SocketAddr = if target.is_ipv4() {
        "0.0.0.0:0".parse().unwrap()
    } else {
        "[::]:0".parse().unwrap()
    };

    let to_dial_error = |source: io::Error| DialError::Connect {
        network: Network::Udp,
        address: address.to_string(),
        source,
    };

    let socket = timeout(SOCKET_TIMEOUT, UdpSocket::bind(bind_addr))
        .await
        .unwrap_or_else(|_| Err(timed_out()))
        .map_err(to_dial_error)?;
    timeout(SOCKET_TIMEOUT, socket.connect(target))
        .await
        .unwrap_or_else(|_| Err(timed_out()))
        .map_err(to_dial_error)?;

    Ok(Box::new(SocketConnection { socket }))
}

/// Open a raw ICMP socket and connect it to `address` (a bare dotted
/// IPv4 address, no port — matching the original `net.Dial("ip4:icmp",
/// ...)` call).  Connecting a raw socket restricts reads to datagrams
/// from that peer and lets writes omit the destination on every call,
/// standing in for what the Go runtime does under the hood for
/// `"ip4:icmp"`.
///
/// Requires `CAP_NET_RAW` (or root) on most operating systems; the
/// tool does not attempt to acquire it, per §6.4.
async fn dial_raw_icmp(address: &str) -> Result<Box<dyn Connection>, DialError> {
    let ip: IpAddr = address
        .parse()
        .map_err(|_| DialError::AddressInvalid {
            network: Network::RawIcmp,
            address: address.to_string(),
        })?;

    let to_dial_error = |source: io::Error| DialError::Connect {
        network: Network::RawIcmp,
        address: address.to_string(),
        source,
    };

    let raw = Socket::new(Domain::IPV4, Type::RAW, Some(SockProtocol::ICMPV4))
        .map_err(to_dial_error)?;
    raw.set_nonblocking(true).map_err(to_dial_error)?;
    raw.connect(&SocketAddr::new(ip, 0).into())
        .map_err(to_dial_error)?;

    let std_socket: std::net::UdpSocket = raw.into();
    let socket = UdpSocket::from_std(std_socket).map_err(to_dial_error)?;

    Ok(Box::new(SocketConnection { socket }))
}

#[cfg(any(feature = "test-util", test))]
pub mod test_util {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A scripted [`Connection`]: returns canned replies to `read`
    /// one at a time, and records everything written to it.
    pub struct MockConnection {
        pub local_addr: IpAddr,
        pub replies: Mutex<VecDeque<Vec<u8>>>,
        pub written: Mutex<Vec<Vec<u8>>>,
    }

    impl MockConnection {
        pub fn new(local_addr: IpAddr, replies: Vec<Vec<u8>>) -> Self {
            Self {
                local_addr,
                replies: Mutex::new(replies.into()),
                written: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Connection for MockConnection {
        async fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.written.lock().unwrap().push(bytes.to_vec());
            Ok(bytes.len())
        }

        async fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
            let reply = self.replies.lock().unwrap().pop_front().ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "mock connection exhausted")
            })?;
            let n = reply.len().min(buffer.len());
            buffer[..n].copy_from_slice(&reply[..n]);
            Ok(n)
        }

        fn local_addr(&self) -> io::Result<IpAddr> {
            Ok(self.local_addr)
        }
    }

    /// A [`Dialer`] that hands back pre-scripted connections (or a
    /// pre-scripted failure) and records every `(network, address)`
    /// pair it was asked to dial, in order.
    #[derive(Default)]
    pub struct MockDialer {
        pub dialed: Mutex<Vec<(Network, String)>>,
        pub connections: Mutex<VecDeque<Result<MockConnection, DialError>>>,
    }

    impl MockDialer {
        pub fn new(connections: Vec<Result<MockConnection, DialError>>) -> Self {
            Self {
                dialed: Mutex::new(Vec::new()),
                connections: Mutex::new(connections.into()),
            }
        }

        pub fn dialed_addresses(&self) -> Vec<(Network, String)> {
            self.dialed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Dialer for MockDialer {
        async fn dial(
            &self,
            network: Network,
            address: &str,
        ) -> Result<Box<dyn Connection>, DialError> {
            self.dialed
                .lock()
                .unwrap()
                .push((network, address.to_string()));

            match self.connections.lock().unwrap().pop_front() {
                Some(Ok(conn)) => Ok(Box::new(conn)),
                Some(Err(err)) => Err(err),
                None => Err(DialError::Connect {
                    network,
                    address: address.to_string(),
                    source: io::Error::new(io::ErrorKind::Other, "mock dialer exhausted"),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn mock_dialer_records_calls_in_order() {
        let dialer = MockDialer::new(vec![
            Ok(MockConnection::new(
                IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                vec![vec![1, 2, 3]],
            )),
            Ok(MockConnection::new(
                IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                vec![vec![4, 5, 6]],
            )),
        ]);

        let _ = dialer.dial(Network::Udp, "198.41.0.4:53").await.unwrap();
        let _ = dialer.dial(Network::RawIcmp, "127.0.0.1").await.unwrap();

        assert_eq!(
            vec![
                (Network::Udp, "198.41.0.4:53".to_string()),
                (Network::RawIcmp, "127.0.0.1".to_string()),
            ],
            dialer.dialed_addresses(),
        );
    }

    #[tokio::test]
    async fn mock_connection_read_yields_scripted_bytes() {
        let mut conn = MockConnection::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            vec![vec![0xFF; 30]],
        );
        let mut buf = vec![0u8; 64];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(30, n);
        assert!(buf[..30].iter().all(|&b| b == 0xFF));
    }
}
