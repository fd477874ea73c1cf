//! Packet capture backends
//!
//! A switch port is anything that can receive and transmit whole Ethernet
//! frames. AF_PACKET sockets are the production backend; tests plug in
//! in-memory ports.

mod af_packet;

pub use af_packet::AfPacketSocket;

use crate::Result;
use std::future::Future;

/// Frame I/O for one switch port
///
/// Both directions take `&self` so a port can receive and transmit from
/// different tasks at once.
pub trait Capture: Send + Sync {
    /// Receive one frame into `buf`, returning its length
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = Result<usize>> + Send;

    /// Transmit one frame
    fn send(&self, buf: &[u8]) -> impl Future<Output = Result<usize>> + Send;
}
