//! Wire formats handled by the switch
//!
//! Ethernet, IPv4 and UDP are parsed zero-copy; the key/value lookup
//! protocol rides on top of UDP.

pub mod ethernet;
pub mod ipv4;
pub mod kv;
pub mod types;
pub mod udp;

pub use types::*;
