//! In-process two-host topology
//!
//!   h2 (client, 10.0.0.2) -- port 2 -- switch -- port 1 -- h1 (backend, 10.0.0.1)
//!
//! Hosts are simulated: h1 runs the real backend over hand-built frames, h2
//! sends lookups and reads whatever the switch delivers to it.

use netcache::dataplane::{new_tables, Action, ControlPlane, Pipeline, PipelineConfig, PortId};
use netcache::kv::{probe_payload, Backend, KvStore, LookupResult, OTHER_TRAFFIC_PORT};
use netcache::protocol::ethernet::{Frame, FrameBuilder};
use netcache::protocol::ipv4::{self, Ipv4Builder, Ipv4Header};
use netcache::protocol::kv::{Request, Response, DEFAULT_PORT};
use netcache::protocol::udp::{UdpBuilder, UdpHeader};
use netcache::protocol::{EtherType, MacAddr};
use netcache::telemetry::MetricsRegistry;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Client's ephemeral UDP port
pub const CLIENT_UDP_PORT: u16 = 40000;

/// Switch traversals before a frame is considered lost
const MAX_HOPS: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct Host {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub port: PortId,
}

pub const H1: Host = Host {
    mac: MacAddr([0x00, 0x00, 0x00, 0x00, 0x00, 0x01]),
    ip: Ipv4Addr::new(10, 0, 0, 1),
    port: 1,
};

pub const H2: Host = Host {
    mac: MacAddr([0x00, 0x00, 0x00, 0x00, 0x00, 0x02]),
    ip: Ipv4Addr::new(10, 0, 0, 2),
    port: 2,
};

/// Backend data set: key -> key + 10 * key for keys 1..=200
pub fn data() -> KvStore {
    (1..=200).map(|k| (k, k + k * 10)).collect()
}

/// Keys pre-installed in the switch cache
pub fn cached_keys() -> Vec<u32> {
    data().iter().take(3).map(|(k, _)| k).collect()
}

pub struct SingleSwitch {
    pub control: ControlPlane,
    pub pipeline: Pipeline,
    pub metrics: Arc<MetricsRegistry>,
    backend: Backend,
}

impl SingleSwitch {
    /// Switch with empty tables
    pub fn new() -> Self {
        let (control, reader) = new_tables();
        let metrics = Arc::new(MetricsRegistry::new());
        let pipeline = Pipeline::new(reader, PipelineConfig::default(), metrics.clone());
        Self {
            control,
            pipeline,
            metrics,
            backend: Backend::new(data()),
        }
    }

    /// Forwarding entry per host and the first three keys cached
    pub fn provisioned() -> Self {
        let switch = Self::new();
        for host in [H1, H2] {
            switch.control.install_forwarding_entry(
                format!("{}/32", host.ip).parse().unwrap(),
                host.mac,
                host.port,
            );
        }
        let store = data();
        for key in cached_keys() {
            switch
                .control
                .install_cache_entry(key, store.get(key).unwrap());
        }
        switch
    }

    /// h2 looks up `key` on h1
    pub fn client_get(&self, key: u32) -> LookupResult {
        let request = udp_frame(
            H2,
            CLIENT_UDP_PORT,
            H1,
            DEFAULT_PORT,
            &Request::new(key).encode(),
        );
        match self.deliver_to_client(request) {
            Some(frame) => client_receive(&frame, key).unwrap_or(LookupResult::Timeout),
            None => LookupResult::Timeout,
        }
    }

    /// h2 sends the probe to h1; true when anything came back
    pub fn other_traffic(&self) -> bool {
        let probe = udp_frame(H2, CLIENT_UDP_PORT, H1, OTHER_TRAFFIC_PORT, &probe_payload());
        self.deliver_to_client(probe).is_some()
    }

    /// Inject a frame from h2 and follow it until something reaches h2 again
    fn deliver_to_client(&self, mut frame: Vec<u8>) -> Option<Vec<u8>> {
        let mut ingress = H2.port;

        for _ in 0..MAX_HOPS {
            let (port, packet) = match self.pipeline.process(ingress, &frame) {
                Action::Forward { port, packet } | Action::Reply { port, packet } => {
                    (port, packet)
                }
                Action::Drop(_) => return None,
            };

            if port == H2.port {
                return Some(packet);
            }
            if port != H1.port {
                return None;
            }
            frame = self.backend_receive(&packet)?;
            ingress = H1.port;
        }
        None
    }

    /// h1's network stack plus the backend server
    fn backend_receive(&self, frame: &[u8]) -> Option<Vec<u8>> {
        let eth = Frame::parse(frame).ok()?;
        if eth.dst_mac() != H1.mac {
            return None;
        }
        let ip = Ipv4Header::parse(eth.payload()).ok()?;
        if ip.dst_addr() != H1.ip || !ip.validate_checksum() {
            return None;
        }
        let udp = UdpHeader::parse(ip.payload()).ok()?;
        if udp.dst_port() != DEFAULT_PORT {
            return None;
        }
        let response = self.backend.respond(udp.payload())?;
        // Static neighbor entry for h2
        let reply_to = Host {
            ip: ip.src_addr(),
            ..H2
        };
        Some(udp_frame(
            H1,
            DEFAULT_PORT,
            reply_to,
            udp.src_port(),
            &response.encode(),
        ))
    }
}

/// h2's network stack plus the client's response matching
fn client_receive(frame: &[u8], key: u32) -> Option<LookupResult> {
    let eth = Frame::parse(frame).ok()?;
    if eth.dst_mac() != H2.mac {
        return None;
    }
    let ip = Ipv4Header::parse(eth.payload()).ok()?;
    if ip.dst_addr() != H2.ip || !ip.validate_checksum() {
        return None;
    }
    let udp = UdpHeader::parse(ip.payload()).ok()?;
    if udp.dst_port() != CLIENT_UDP_PORT || !udp.validate_checksum(ip.src_addr(), ip.dst_addr()) {
        return None;
    }
    let response = Response::parse(udp.payload()).ok()?;
    (response.key == key).then_some(response.outcome.into())
}

pub fn udp_frame(src: Host, src_port: u16, dst: Host, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp = UdpBuilder::new()
        .src_port(src_port)
        .dst_port(dst_port)
        .payload(payload)
        .build(src.ip, dst.ip);
    let ip = Ipv4Builder::new()
        .src_addr(src.ip)
        .dst_addr(dst.ip)
        .protocol(ipv4::protocol::UDP)
        .payload(&udp)
        .build();
    FrameBuilder::new()
        .dst_mac(dst.mac)
        .src_mac(src.mac)
        .ethertype(EtherType::Ipv4 as u16)
        .payload(&ip)
        .build()
}
