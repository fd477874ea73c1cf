//! Backend lookup server

use super::store::KvStore;
use crate::protocol::kv::{Request, Response};
use crate::{Error, Result};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Backend server answering every lookup from its store
#[derive(Debug, Clone)]
pub struct Backend {
    store: KvStore,
}

impl Backend {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Answer one datagram. Anything that is not a lookup request gets no
    /// answer.
    pub fn respond(&self, payload: &[u8]) -> Option<Response> {
        let request = Request::parse(payload).ok()?;
        Some(match self.store.get(request.key) {
            Some(value) => Response::hit(request.key, value),
            None => Response::not_found(request.key),
        })
    }

    /// Bind `addr` and serve forever
    pub async fn serve(&self, addr: SocketAddr) -> Result<()> {
        let socket = UdpSocket::bind(addr).await.map_err(Error::Io)?;
        self.serve_on(socket).await
    }

    /// Serve on an already bound socket
    pub async fn serve_on(&self, socket: UdpSocket) -> Result<()> {
        info!(
            "Backend listening on {} with {} entries",
            socket.local_addr().map_err(Error::Io)?,
            self.store.len()
        );

        let mut buf = [0u8; 1500];
        loop {
            let (len, peer) = socket.recv_from(&mut buf).await.map_err(Error::Io)?;
            let Some(response) = self.respond(&buf[..len]) else {
                debug!("Ignoring {} byte datagram from {}", len, peer);
                continue;
            };
            debug!("{} -> key {} = {}", peer, response.key, response.outcome);
            if let Err(e) = socket.send_to(&response.encode(), peer).await {
                warn!("Failed to answer {}: {}", peer, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::kv::Outcome;

    fn backend() -> Backend {
        Backend::new((1..=200).map(|k| (k, k + k * 10)).collect())
    }

    #[test]
    fn test_respond_hit_and_not_found() {
        let backend = backend();

        let hit = backend.respond(&Request::new(4).encode()).unwrap();
        assert_eq!(hit, Response::hit(4, 44));

        let miss = backend.respond(&Request::new(250).encode()).unwrap();
        assert_eq!(miss.outcome, Outcome::NotFound);
        assert_eq!(miss.key, 250);
    }

    #[test]
    fn test_respond_ignores_non_requests() {
        let backend = backend();
        assert!(backend.respond(&[97, 0, 0, 0, 1]).is_none());
        assert!(backend.respond(&[]).is_none());
        assert!(backend.respond(&Response::hit(1, 11).encode()).is_none());
    }

    #[tokio::test]
    async fn test_serve_over_udp() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let server = tokio::spawn(async move { backend().serve_on(socket).await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&Request::new(7).encode(), addr).await.unwrap();
        let mut buf = [0u8; 64];
        let (len, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(Response::parse(&buf[..len]).unwrap(), Response::hit(7, 77));

        server.abort();
    }
}
