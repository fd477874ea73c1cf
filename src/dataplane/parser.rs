//! Packet classification
//!
//! Walks Ethernet -> IPv4 -> UDP -> lookup header and sorts every frame into
//! exactly one class. Malformed or unexpected input is a normal outcome
//! (`Classification::Unrecognized`), never an error.

use crate::protocol::ethernet::Frame;
use crate::protocol::ipv4::{self, Ipv4Header};
use crate::protocol::kv::{Request, Response};
use crate::protocol::udp::UdpHeader;
use crate::protocol::{EtherType, MacAddr};
use std::fmt;
use std::net::Ipv4Addr;

/// Addressing of a parsed packet, as needed for forwarding and replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

/// Header layer at which parsing stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ethernet,
    Ipv4,
    Udp,
}

/// Why a packet was not recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unrecognized {
    /// Truncated or internally inconsistent header
    Malformed(Layer),
    BadChecksum(Layer),
    EtherType(u16),
    Fragment,
    IpProtocol(u8),
    /// UDP traffic not involving the lookup port
    Port { src: u16, dst: u16 },
    /// On the lookup port but not a well-formed lookup message
    Payload,
}

impl fmt::Display for Unrecognized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unrecognized::Malformed(layer) => write!(f, "malformed {:?} header", layer),
            Unrecognized::BadChecksum(layer) => write!(f, "bad {:?} checksum", layer),
            Unrecognized::EtherType(t) => match EtherType::from_u16(*t) {
                Some(known) => write!(f, "unsupported EtherType {:?}", known),
                None => write!(f, "unsupported EtherType 0x{:04x}", t),
            },
            Unrecognized::Fragment => write!(f, "IPv4 fragment"),
            Unrecognized::IpProtocol(p) => write!(f, "unsupported IP protocol {}", p),
            Unrecognized::Port { src, dst } => write!(f, "foreign UDP ports {} -> {}", src, dst),
            Unrecognized::Payload => write!(f, "malformed lookup payload"),
        }
    }
}

/// Result of parsing a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Lookup-protocol traffic that only needs routing (backend answers)
    Forward(Addressing),
    /// A lookup request the cache may answer
    Lookup { addressing: Addressing, key: u32 },
    Unrecognized(Unrecognized),
}

/// Classify a raw frame. Pure function of the bytes.
///
/// With `verify_udp_checksum` off a non-zero UDP checksum is not checked.
/// Interfaces with TX checksum offload hand over locally sent frames whose
/// UDP checksum is only partial; the IPv4 header checksum is always checked.
pub fn classify(packet: &[u8], lookup_port: u16, verify_udp_checksum: bool) -> Classification {
    match parse(packet, lookup_port, verify_udp_checksum) {
        Ok(class) => class,
        Err(reason) => Classification::Unrecognized(reason),
    }
}

fn parse(
    packet: &[u8],
    lookup_port: u16,
    verify_udp_checksum: bool,
) -> Result<Classification, Unrecognized> {
    let frame = Frame::parse(packet).map_err(|_| Unrecognized::Malformed(Layer::Ethernet))?;
    if frame.ethertype() != EtherType::Ipv4 as u16 {
        return Err(Unrecognized::EtherType(frame.ethertype()));
    }

    let ip = Ipv4Header::parse(frame.payload()).map_err(|_| Unrecognized::Malformed(Layer::Ipv4))?;
    if !ip.validate_checksum() {
        return Err(Unrecognized::BadChecksum(Layer::Ipv4));
    }
    if ip.is_fragment() {
        return Err(Unrecognized::Fragment);
    }
    if ip.protocol() != ipv4::protocol::UDP {
        return Err(Unrecognized::IpProtocol(ip.protocol()));
    }

    let udp = UdpHeader::parse(ip.payload()).map_err(|_| Unrecognized::Malformed(Layer::Udp))?;
    if verify_udp_checksum && !udp.validate_checksum(ip.src_addr(), ip.dst_addr()) {
        return Err(Unrecognized::BadChecksum(Layer::Udp));
    }

    let addressing = Addressing {
        src_mac: frame.src_mac(),
        dst_mac: frame.dst_mac(),
        src_ip: ip.src_addr(),
        dst_ip: ip.dst_addr(),
        src_port: udp.src_port(),
        dst_port: udp.dst_port(),
    };

    let to_lookup = addressing.dst_port == lookup_port;
    let from_lookup = addressing.src_port == lookup_port;

    // Both ports may be the lookup port, so a failed request parse still
    // leaves the response check
    if to_lookup {
        if let Ok(request) = Request::parse(udp.payload()) {
            return Ok(Classification::Lookup {
                addressing,
                key: request.key,
            });
        }
    }
    if from_lookup && Response::parse(udp.payload()).is_ok() {
        return Ok(Classification::Forward(addressing));
    }

    if to_lookup || from_lookup {
        Err(Unrecognized::Payload)
    } else {
        Err(Unrecognized::Port {
            src: addressing.src_port,
            dst: addressing.dst_port,
        })
    }
}
