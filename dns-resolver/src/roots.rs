//! The 13 well-known root nameserver addresses (§3.5).

use std::net::Ipv4Addr;

/// One of the 13 IANA root nameservers.
pub const ROOT_SERVERS: [Ipv4Addr; 13] = [
    Ipv4Addr::new(198, 41, 0, 4),     // a.root-servers.net
    Ipv4Addr::new(199, 9, 14, 201),   // b.root-servers.net
    Ipv4Addr::new(192, 33, 4, 12),    // c.root-servers.net
    Ipv4Addr::new(199, 7, 91, 13),    // d.root-servers.net
    Ipv4Addr::new(192, 203, 230, 10), // e.root-servers.net
    Ipv4Addr::new(192, 5, 5, 241),    // f.root-servers.net
    Ipv4Addr::new(192, 112, 36, 4),   // g.root-servers.net
    Ipv4Addr::new(198, 97, 190, 53),  // h.root-servers.net
    Ipv4Addr::new(192, 36, 148, 17),  // i.root-servers.net
    Ipv4Addr::new(192, 58, 128, 30),  // j.root-servers.net
    Ipv4Addr::new(193, 0, 14, 129),   // k.root-servers.net
    Ipv4Addr::new(199, 7, 83, 42),    // l.root-servers.net
    Ipv4Addr::new(202, 12, 27, 33),   // m.root-servers.net
];

/// Pick a root server to start a resolution attempt from.  Picking
/// randomly rather than always `ROOT_SERVERS[0]` spreads load across
/// the root the way a real resolver would, and keeps a single flaky
/// root from wedging every invocation.
pub fn pick_root_server() -> Ipv4Addr {
    use rand::seq::SliceRandom;
    *ROOT_SERVERS.choose(&mut rand::thread_rng()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn there_are_thirteen_root_servers() {
        assert_eq!(13, ROOT_SERVERS.len());
    }

    #[test]
    fn picked_root_server_is_one_of_the_thirteen() {
        let picked = pick_root_server();
        assert!(ROOT_SERVERS.contains(&picked));
    }
}
