//! Lookup client
//!
//! Sends one GET and waits for the matching response. Stale answers for other
//! keys are skipped until the deadline passes.

use crate::protocol::kv::{Outcome, Request, Response};
use crate::{Error, Result};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};
use tracing::debug;

/// UDP port the non-lookup probe is sent to
pub const OTHER_TRAFFIC_PORT: u16 = 10;

/// What a client observed for one lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupResult {
    Value(u32),
    NotFound,
    Timeout,
}

impl fmt::Display for LookupResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupResult::Value(v) => write!(f, "{}", v),
            LookupResult::NotFound => write!(f, "NOTFOUND"),
            LookupResult::Timeout => write!(f, "Timeout"),
        }
    }
}

impl From<Outcome> for LookupResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Value(v) => LookupResult::Value(v),
            Outcome::NotFound => LookupResult::NotFound,
        }
    }
}

fn unspecified_for(server: &SocketAddr) -> SocketAddr {
    match server {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), 0),
    }
}

/// Send one GET for `key` to `server` and wait up to `wait` for the answer.
/// Datagrams that are not a response for this key are ignored.
pub async fn lookup(server: SocketAddr, key: u32, wait: Duration) -> Result<LookupResult> {
    let socket = UdpSocket::bind(unspecified_for(&server))
        .await
        .map_err(Error::Io)?;
    socket
        .send_to(&Request::new(key).encode(), server)
        .await
        .map_err(Error::Io)?;

    let deadline = Instant::now() + wait;
    let mut buf = [0u8; 1500];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Ok(received) = timeout(remaining, socket.recv_from(&mut buf)).await else {
            return Ok(LookupResult::Timeout);
        };
        let (len, peer) = received.map_err(Error::Io)?;

        match Response::parse(&buf[..len]) {
            Ok(response) if response.key == key => return Ok(response.outcome.into()),
            Ok(response) => debug!("Stale response for key {} from {}", response.key, peer),
            Err(e) => debug!("Ignoring datagram from {}: {}", peer, e),
        }
    }
}

/// Probe payload: one marker byte followed by seven integers
pub fn probe_payload() -> Vec<u8> {
    let mut payload = vec![97u8];
    for i in 1..=7u32 {
        payload.extend_from_slice(&i.to_be_bytes());
    }
    payload
}

/// Send the non-lookup probe to `host` and report whether anything answered
/// within `wait`.
pub async fn send_other_traffic(host: IpAddr, wait: Duration) -> Result<bool> {
    let target = SocketAddr::new(host, OTHER_TRAFFIC_PORT);
    let socket = UdpSocket::bind(unspecified_for(&target))
        .await
        .map_err(Error::Io)?;
    socket
        .send_to(&probe_payload(), target)
        .await
        .map_err(Error::Io)?;

    let mut buf = [0u8; 1500];
    match timeout(wait, socket.recv_from(&mut buf)).await {
        Ok(Ok(_)) => Ok(true),
        // ICMP port unreachable surfaces as a receive error: still no answer
        Ok(Err(_)) | Err(_) => Ok(false),
    }
}
