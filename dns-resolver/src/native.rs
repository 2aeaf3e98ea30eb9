//! Adapts the iterative [`Resolver`] to the [`AddressResolver`]
//! capability `ping` depends on, so `ping --resolver native` can skip
//! the host OS resolver entirely (§4.7).

use async_trait::async_trait;
use std::net::IpAddr;
use tokio::sync::Mutex;

use net_dialer::{resolve_source_via, AddressResolver, Dialer, ResolveError};

use crate::resolver::Resolver;

/// An [`AddressResolver`] backed by this crate's own DNS walk rather
/// than `getaddrinfo`.  Wraps a [`Resolver`] behind a `Mutex` since
/// `AddressResolver::resolve_destination` takes `&self` but the
/// underlying resolver needs `&mut self` to track issued transaction
/// IDs.
pub struct NativeResolver<D> {
    inner: Mutex<Resolver<D>>,
}

impl<D: Dialer> NativeResolver<D> {
    pub fn new(dialer: D) -> Self {
        Self {
            inner: Mutex::new(Resolver::new(dialer)),
        }
    }
}

#[async_trait]
impl<D: Dialer> AddressResolver for NativeResolver<D> {
    async fn resolve_source(&self) -> Result<IpAddr, ResolveError> {
        let resolver = self.inner.lock().await;
        resolve_source_via(resolver.dialer()).await
    }

    async fn resolve_destination(&self, host: &str) -> Result<IpAddr, ResolveError> {
        let mut resolver = self.inner.lock().await;
        resolver
            .resolve(host)
            .await
            .map_err(|source| ResolveError::Resolution {
                host: host.to_string(),
                source: Box::new(source),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dns_types::protocol::types::test_util::*;
    use net_dialer::dialer::test_util::{MockConnection, MockDialer};
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn resolve_destination_surfaces_resolution_errors() {
        let dialer = MockDialer::new(vec![Ok(MockConnection::new(
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            vec![{
                let question = Question {
                    name: domain("placeholder."),
                    qtype: QueryType::Record(RecordType::A),
                    qclass: QueryClass::Record(RecordClass::IN),
                };
                Message::from_question(0, question)
                    .make_response()
                    .into_octets()
                    .unwrap()
            }],
        ))]);

        let resolver = NativeResolver::new(dialer);
        let err = resolver
            .resolve_destination("nowhere.invalid")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Resolution { .. }));
    }

    #[tokio::test]
    async fn resolve_source_delegates_to_inner_dialer() {
        let dialer = MockDialer::new(vec![Ok(MockConnection::new(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
            vec![],
        ))]);

        let resolver = NativeResolver::new(dialer);
        let addr = resolver.resolve_source().await.unwrap();
        assert_eq!(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), addr);
    }
}
