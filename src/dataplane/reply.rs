//! Cache-hit reply synthesis

use super::parser::Addressing;
use crate::protocol::ethernet::FrameBuilder;
use crate::protocol::ipv4::{self, Ipv4Builder};
use crate::protocol::kv::Response;
use crate::protocol::udp::UdpBuilder;
use crate::protocol::EtherType;

/// Build the response frame for a cache hit.
///
/// Every address pair of the request is swapped (MAC, IP, UDP port) and
/// lengths and checksums are computed from scratch. Deterministic: the same
/// request addressing, key and value always give the same bytes.
pub fn synthesize_reply(request: &Addressing, key: u32, value: u32) -> Vec<u8> {
    let udp = UdpBuilder::new()
        .src_port(request.dst_port)
        .dst_port(request.src_port)
        .payload(&Response::hit(key, value).encode())
        .build(request.dst_ip, request.src_ip);

    let ip = Ipv4Builder::new()
        .src_addr(request.dst_ip)
        .dst_addr(request.src_ip)
        .protocol(ipv4::protocol::UDP)
        .payload(&udp)
        .build();

    FrameBuilder::new()
        .dst_mac(request.src_mac)
        .src_mac(request.dst_mac)
        .ethertype(EtherType::Ipv4 as u16)
        .payload(&ip)
        .build()
}
