//! The probe loop (§4.5): resolve source and destination, then emit
//! `count` echo requests in strict sequence over a fresh raw socket
//! each, parsing the sequence number back out of every reply.

use std::net::{IpAddr, Ipv4Addr};

use net_dialer::{AddressResolver, Dialer, Network};

use crate::error::ProbeError;
use crate::icmp::EchoRequest;
use crate::ipv4::build_datagram;

/// How many octets to read a reply into (§4.5).
const REPLY_BUFFER_SIZE: usize = 2048;

const IP_HEADER_LEN: usize = 20;
const ICMP_HEADER_LEN: usize = 8;

/// ICMP identifier used on every outbound echo request. Fixed at zero
/// rather than randomised per pinger instance: a fresh raw socket is
/// opened for every packet and there is never more than one concurrent
/// probe per `Pinger` (§9 Open Question 5 / §5), so there is nothing
/// for an identifier to disambiguate.
const IDENTIFIER: u16 = 0;

/// The outcome of a single echo probe: what was sent, and the
/// sequence number read back out of the reply.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ProbeOutcome {
    pub sequence_number: u16,
    pub bytes_sent: usize,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub received_sequence_number: u16,
}

/// Sends ICMP echo requests to a host and reads back the replies, one
/// socket per packet (§4.6, §5). `D` opens the raw `ip4:icmp` sockets
/// used to exchange probes; `R` resolves this host's own outbound
/// address and the target hostname, per §4.7.
pub struct Pinger<D, R> {
    dialer: D,
    address_resolver: R,
}

impl<D: Dialer, R: AddressResolver> Pinger<D, R> {
    pub fn new(dialer: D, address_resolver: R) -> Self {
        Self {
            dialer,
            address_resolver,
        }
    }

    /// Resolve `host`, then send `count` echo requests in sequence
    /// `0, 1, ..., count - 1`, printing a sent/received line for each
    /// (§4.5, §6.1) and returning every outcome in order.
    pub async fn ping(&self, host: &str, count: u16) -> Result<Vec<ProbeOutcome>, ProbeError> {
        let source = self.resolve_source().await?;
        let destination = self.resolve_destination(host).await?;

        tracing::debug!(%host, %source, %destination, count, "address resolution complete");

        let mut outcomes = Vec::with_capacity(count.into());
        for seq in 0..count {
            outcomes.push(self.probe_one(host, source, destination, seq).await?);
        }
        Ok(outcomes)
    }

    async fn resolve_source(&self) -> Result<Ipv4Addr, ProbeError> {
        match self.address_resolver.resolve_source().await {
            Ok(IpAddr::V4(v4)) => Ok(v4),
            Ok(IpAddr::V6(_)) => Err(ProbeError::Ipv6Unsupported {
                host: "<local>".to_string(),
            }),
            Err(source) => Err(ProbeError::ResolveSource { source }),
        }
    }

    async fn resolve_destination(&self, host: &str) -> Result<Ipv4Addr, ProbeError> {
        match self.address_resolver.resolve_destination(host).await {
            Ok(IpAddr::V4(v4)) => Ok(v4),
            Ok(IpAddr::V6(_)) => Err(ProbeError::Ipv6Unsupported {
                host: host.to_string(),
            }),
            Err(source) => Err(ProbeError::ResolveDestination {
                host: host.to_string(),
                source,
            }),
        }
    }

    async fn probe_one(
        &self,
        host: &str,
        source: Ipv4Addr,
        destination: Ipv4Addr,
        seq: u16,
    ) -> Result<ProbeOutcome, ProbeError> {
        let icmp_message = EchoRequest {
            identifier: IDENTIFIER,
            sequence_number: seq,
        }
        .build();
        let packet = build_datagram(source, destination, &icmp_message);

        let address = destination.to_string();
        let mut conn = self
            .dialer
            .dial(Network::RawIcmp, &address)
            .await
            .map_err(|source| ProbeError::Dial {
                host: host.to_string(),
                seq,
                source,
            })?;

        conn.write(&packet)
            .await
            .map_err(|source| ProbeError::Io {
                host: host.to_string(),
                seq,
                source,
            })?;

        println!(
            "sent ICMP echo request ({} bytes) from {}, to {}, seq_no: {}",
            packet.len(),
            source,
            destination,
            seq
        );

        let mut reply = vec![0u8; REPLY_BUFFER_SIZE];
        let n = conn.read(&mut reply).await.map_err(|source| ProbeError::Io {
            host: host.to_string(),
            seq,
            source,
        })?;
        reply.truncate(n);
        while reply.last() == Some(&0) {
            reply.pop();
        }

        let received_sequence_number =
            parse_echo_reply(&reply).ok_or_else(|| ProbeError::ReplyTooShort {
                host: host.to_string(),
                seq,
                len: reply.len(),
            })?;

        println!(
            "received ICMP echo packet from {destination}, seq no: {received_sequence_number}\n"
        );

        Ok(ProbeOutcome {
            sequence_number: seq,
            bytes_sent: packet.len(),
            source,
            destination,
            received_sequence_number,
        })
    }
}

/// Skip the 20-octet IP header, read the ICMP header, and return the
/// big-endian sequence number at offset 6 of it (§4.5).
fn parse_echo_reply(reply: &[u8]) -> Option<u16> {
    let icmp_header = reply.get(IP_HEADER_LEN..IP_HEADER_LEN + ICMP_HEADER_LEN)?;
    Some(u16::from_be_bytes([icmp_header[6], icmp_header[7]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use net_dialer::dialer::test_util::{MockConnection, MockDialer};
    use net_dialer::resolver::test_util::MockAddressResolver;
    use std::net::Ipv4Addr;

    fn localhost_outcome_dialer(count: usize) -> MockDialer {
        MockDialer::new(
            std::iter::repeat_with(|| {
                Ok(MockConnection::new(
                    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                    vec![vec![0xFFu8; 30]],
                ))
            })
            .take(count)
            .collect(),
        )
    }

    #[tokio::test]
    async fn ping_success_dials_raw_icmp_once_per_packet() {
        let dialer = localhost_outcome_dialer(3);
        let resolver = MockAddressResolver::fixed(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
        );

        let pinger = Pinger::new(dialer, resolver);
        let outcomes = pinger.ping("test-host.com", 3).await.unwrap();

        assert_eq!(3, outcomes.len());
        assert_eq!(
            vec![
                (Network::RawIcmp, "127.0.0.1".to_string()),
                (Network::RawIcmp, "127.0.0.1".to_string()),
                (Network::RawIcmp, "127.0.0.1".to_string()),
            ],
            pinger.dialer.dialed_addresses(),
        );
    }

    #[tokio::test]
    async fn ping_reports_source_resolution_error() {
        let dialer = MockDialer::new(vec![]);
        let resolver = MockAddressResolver::source_error();

        let pinger = Pinger::new(dialer, resolver);
        let err = pinger.ping("test-host.com", 3).await.unwrap_err();

        assert!(matches!(err, ProbeError::ResolveSource { .. }));
        assert_eq!(
            "error resolving source address: mocked source resolution failure",
            err.to_string()
        );
    }

    #[tokio::test]
    async fn ping_wraps_dial_failure_on_last_packet() {
        let dialer = MockDialer::new(vec![
            Ok(MockConnection::new(
                IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                vec![vec![0xFFu8; 30]],
            )),
            Ok(MockConnection::new(
                IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
                vec![vec![0xFFu8; 30]],
            )),
            Err(net_dialer::DialError::Connect {
                network: Network::RawIcmp,
                address: "127.0.0.1".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "network-dial-error"),
            }),
        ]);
        let resolver = MockAddressResolver::fixed(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
        );

        let pinger = Pinger::new(dialer, resolver);
        let err = pinger.ping("test-host.com", 3).await.unwrap_err();

        assert!(matches!(err, ProbeError::Dial { ref host, seq: 2, .. } if host == "test-host.com"));
        assert!(err
            .to_string()
            .starts_with("error establishing connection with test-host.com"));
    }

    #[test]
    fn parse_echo_reply_reads_sequence_number_at_offset_six_of_icmp_header() {
        let mut reply = vec![0u8; IP_HEADER_LEN];
        reply.extend_from_slice(&[8, 0, 0, 0, 0, 0, 0x01, 0x2C]); // seq 300
        assert_eq!(Some(300), parse_echo_reply(&reply));
    }

    #[test]
    fn parse_echo_reply_rejects_short_input() {
        assert_eq!(None, parse_echo_reply(&[0u8; 10]));
    }
}
