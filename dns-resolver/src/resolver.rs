//! The iterative resolver's query/response state machine (§4.3).

use async_recursion::async_recursion;
use rand::Rng;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};

use dns_types::protocol::types::*;
use net_dialer::{Dialer, Network};

use crate::error::ResolutionError;
use crate::roots::pick_root_server;

/// Shared CNAME-chase / NS-recursion depth cap (§9 Open Question 4).
/// Scaled down from the teacher's `RECURSION_LIMIT` of 32, since this
/// resolver never consults a local zone or cache and so has a much
/// shallower job to do per hop.
pub const RECURSION_LIMIT: usize = 8;

/// How many octets to read a reply into.  2056 rather than a round
/// 2048 or 4096, matching the historical source's buffer size — DNS
/// replies over UDP cannot legally exceed 512 octets without EDNS(0)
/// (out of scope, §1), so this is generous headroom either way.
const REPLY_BUFFER_SIZE: usize = 2056;

/// Walks DNS referrals from a root server to an authoritative answer,
/// making no use of the host OS resolver.  One instance is created
/// per CLI invocation (§3.5) and used for one or more `resolve` calls.
pub struct Resolver<D> {
    dialer: D,
    root_nameserver: Ipv4Addr,
    issued_txn_ids: HashSet<u16>,
}

impl<D: Dialer> Resolver<D> {
    pub fn new(dialer: D) -> Self {
        Self {
            dialer,
            root_nameserver: pick_root_server(),
            issued_txn_ids: HashSet::new(),
        }
    }

    /// Resolve `host` to an IP address, walking the authoritative
    /// hierarchy from the root.  See §4.3 for the classification
    /// priority order.
    pub async fn resolve(&mut self, host: &str) -> Result<IpAddr, ResolutionError> {
        self.resolve_bounded(host, RECURSION_LIMIT).await
    }

    /// The dialer this resolver issues queries through, so a wrapper
    /// like `NativeResolver` can reuse it for source-address discovery
    /// without needing its own copy.
    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    #[async_recursion]
    async fn resolve_bounded(
        &mut self,
        host: &str,
        recursion_limit: usize,
    ) -> Result<IpAddr, ResolutionError> {
        if recursion_limit == 0 {
            return Err(ResolutionError::RecursionLimit {
                host: host.to_string(),
            });
        }

        let mut nameserver = self.root_nameserver;

        loop {
            tracing::debug!(%host, %nameserver, "querying nameserver");
            let reply = self.query(host, nameserver).await?;

            if let Some(answer) = reply.answers.first() {
                match &answer.rtype_with_data {
                    RecordTypeWithData::A { address } => {
                        tracing::debug!(%host, %nameserver, %address, "got authoritative answer");
                        return Ok(IpAddr::V4(*address));
                    }
                    RecordTypeWithData::CNAME { cname } => {
                        tracing::debug!(%host, %cname, "chasing CNAME");
                        return self
                            .resolve_bounded(&cname.to_dotted_string(), recursion_limit - 1)
                            .await;
                    }
                    _ => {}
                }
            }

            if let Some(glue_address) = first_glue_address(&reply.additional) {
                tracing::debug!(%host, %nameserver, referral = %glue_address, "following glue record");
                nameserver = glue_address;
                continue;
            }

            if let Some(nsdname) = first_ns_without_glue(&reply.authority) {
                tracing::debug!(%host, %nameserver, ns = %nsdname, "resolving nameserver without glue");
                let ns_ip = self
                    .resolve_bounded(&nsdname.to_dotted_string(), recursion_limit - 1)
                    .await?;
                nameserver = match ns_ip {
                    IpAddr::V4(v4) => v4,
                    // The iterative walk is IPv4-only on the wire (§1
                    // Non-goals); an IPv6-only nameserver glue target
                    // cannot be queried, so treat it as exhausted.
                    IpAddr::V6(_) => {
                        return Err(ResolutionError::ResolutionExhausted {
                            host: host.to_string(),
                        })
                    }
                };
                continue;
            }

            tracing::debug!(%host, %nameserver, "no answer, glue, or NS record in reply");
            return Err(ResolutionError::ResolutionExhausted {
                host: host.to_string(),
            });
        }
    }

    async fn query(&mut self, host: &str, nameserver: Ipv4Addr) -> Result<Message, ResolutionError> {
        let name = DomainName::from_dotted_string(host).ok_or_else(|| ResolutionError::InvalidHostname {
            host: host.to_string(),
        })?;

        let question = Question {
            name,
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        };
        let request = Message::from_question(self.fresh_txn_id(), question);

        let serialised = request
            .into_octets()
            .map_err(|source| ResolutionError::Serialization {
                host: host.to_string(),
                source,
            })?;

        let address = format!("{nameserver}:53");
        let mut conn = self
            .dialer
            .dial(Network::Udp, &address)
            .await
            .map_err(|source| ResolutionError::Dial {
                nameserver: address.clone(),
                source,
            })?;

        conn.write(&serialised)
            .await
            .map_err(|source| ResolutionError::Io {
                nameserver: address.clone(),
                source,
            })?;

        let mut reply = vec![0u8; REPLY_BUFFER_SIZE];
        let n = conn
            .read(&mut reply)
            .await
            .map_err(|source| ResolutionError::Io {
                nameserver: address.clone(),
                source,
            })?;
        reply.truncate(n);

        Message::from_octets(&reply).map_err(|source| ResolutionError::MalformedReply {
            nameserver: address,
            source,
        })
    }

    /// Draw a fresh 16-bit transaction ID, re-rolling on collision
    /// with one already issued by this resolver instance (§3.5, §8.1
    /// property 6).
    fn fresh_txn_id(&mut self) -> u16 {
        loop {
            let id = rand::thread_rng().gen();
            if self.issued_txn_ids.insert(id) {
                return id;
            }
        }
    }
}

/// Scan the Additional section for a glue A record (§4.3, priority 3).
fn first_glue_address(additional: &[ResourceRecord]) -> Option<Ipv4Addr> {
    additional.iter().find_map(|rr| match rr.rtype_with_data {
        RecordTypeWithData::A { address } => Some(address),
        _ => None,
    })
}

/// Scan the Authority section for the first NS record, skipping SOA
/// (§4.3, priority 4 — "note SOA records must be skipped").
fn first_ns_without_glue(authority: &[ResourceRecord]) -> Option<DomainName> {
    authority.iter().find_map(|rr| match &rr.rtype_with_data {
        RecordTypeWithData::NS { nsdname } => Some(nsdname.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::test_util::*;
    use net_dialer::dialer::test_util::{MockConnection, MockDialer};

    /// Build a canned reply. The resolver never checks that a reply's
    /// ID matches its query's, the same as the source this was
    /// translated from, so any fixed ID works here.
    fn reply_bytes(
        answers: Vec<ResourceRecord>,
        authority: Vec<ResourceRecord>,
        additional: Vec<ResourceRecord>,
    ) -> Vec<u8> {
        let question = Question {
            name: domain("placeholder."),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Record(RecordClass::IN),
        };
        let mut response = Message::from_question(0, question).make_response();
        response.answers = answers;
        response.authority = authority;
        response.additional = additional;
        response.into_octets().unwrap()
    }

    fn local(octets: [u8; 4]) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
    }

    #[tokio::test]
    async fn resolves_a_record_through_referral_chain() {
        // S1: root -> referral+glue to a TLD server -> referral+glue
        // to an authoritative server -> answer.
        let dialer = MockDialer::new(vec![
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![],
                    vec![ns_record("com.", "a.gtld-servers.net.")],
                    vec![a_record("a.gtld-servers.net.", Ipv4Addr::new(192, 5, 6, 30))],
                )],
            )),
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![],
                    vec![ns_record("example.com.", "a.iana-servers.net.")],
                    vec![a_record(
                        "a.iana-servers.net.",
                        Ipv4Addr::new(199, 43, 135, 53),
                    )],
                )],
            )),
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![a_record("example.com.", Ipv4Addr::new(93, 184, 216, 34))],
                    vec![],
                    vec![],
                )],
            )),
        ]);

        let mut resolver = Resolver::new(dialer);
        let ip = resolver.resolve("example.com").await.unwrap();
        assert_eq!(IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34)), ip);
    }

    #[tokio::test]
    async fn cname_chase_recurses_into_target() {
        // S2: the first reply answers with a CNAME rather than an A
        // record, so the resolver restarts the walk at the target
        // name before returning to the caller.
        let dialer = MockDialer::new(vec![
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![cname_record("www.example.org.", "example.org.")],
                    vec![],
                    vec![],
                )],
            )),
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![a_record("example.org.", Ipv4Addr::new(2, 2, 2, 2))],
                    vec![],
                    vec![],
                )],
            )),
        ]);

        let mut resolver = Resolver::new(dialer);
        let ip = resolver.resolve("www.example.org").await.unwrap();
        assert_eq!(IpAddr::V4(Ipv4Addr::new(2, 2, 2, 2)), ip);
    }

    #[tokio::test]
    async fn ns_without_glue_recurses_then_retries() {
        // S3: a referral's Authority section names a nameserver with
        // no matching glue in Additional, so the resolver first
        // resolves that nameserver's own address before retrying the
        // original query against it.
        let dialer = MockDialer::new(vec![
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![],
                    vec![ns_record("other.tld.", "ns1.other.tld.")],
                    vec![],
                )],
            )),
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![a_record("ns1.other.tld.", Ipv4Addr::new(5, 5, 5, 5))],
                    vec![],
                    vec![],
                )],
            )),
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![a_record("host.other.tld.", Ipv4Addr::new(6, 6, 6, 6))],
                    vec![],
                    vec![],
                )],
            )),
        ]);

        let mut resolver = Resolver::new(dialer);
        let ip = resolver.resolve("host.other.tld").await.unwrap();
        assert_eq!(IpAddr::V4(Ipv4Addr::new(6, 6, 6, 6)), ip);
    }

    #[tokio::test]
    async fn txn_ids_are_distinct_across_queries() {
        let dialer = MockDialer::new(vec![
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![],
                    vec![ns_record("com.", "ns.example.com.")],
                    vec![a_record("ns.example.com.", Ipv4Addr::new(9, 9, 9, 9))],
                )],
            )),
            Ok(MockConnection::new(
                local([0, 0, 0, 0]),
                vec![reply_bytes(
                    vec![a_record("example.com.", Ipv4Addr::new(1, 1, 1, 1))],
                    vec![],
                    vec![],
                )],
            )),
        ]);

        let mut resolver = Resolver::new(dialer);
        resolver.resolve("example.com").await.unwrap();
        assert_eq!(2, resolver.issued_txn_ids.len());
    }

    #[tokio::test]
    async fn no_answer_no_glue_no_ns_is_exhausted() {
        let dialer = MockDialer::new(vec![Ok(MockConnection::new(
            local([0, 0, 0, 0]),
            vec![reply_bytes(vec![], vec![], vec![])],
        ))]);

        let mut resolver = Resolver::new(dialer);
        let err = resolver.resolve("nowhere.invalid").await.unwrap_err();
        assert!(matches!(err, ResolutionError::ResolutionExhausted { .. }));
    }

    #[tokio::test]
    async fn dial_failure_is_reported_as_dial_error() {
        let dialer: MockDialer = MockDialer::new(vec![Err(net_dialer::DialError::Connect {
            network: Network::Udp,
            address: "198.41.0.4:53".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        })]);

        let mut resolver = Resolver::new(dialer);
        let err = resolver.resolve("example.com").await.unwrap_err();
        assert!(matches!(err, ResolutionError::Dial { .. }));
    }
}
