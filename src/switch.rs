//! Switch runtime
//!
//! Owns the ports and runs one receive loop per port. Every received frame
//! goes through the shared [`Pipeline`] and the resulting packet, if any, is
//! transmitted on the port the pipeline chose.

use crate::capture::Capture;
use crate::dataplane::{Action, Pipeline, PortId};
use crate::telemetry::MetricsRegistry;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Receive buffer size, large enough for any untagged frame
const RX_BUFFER_SIZE: usize = 2048;

pub struct Switch<C: Capture + 'static> {
    pipeline: Arc<Pipeline>,
    ports: BTreeMap<PortId, Arc<C>>,
    metrics: Arc<MetricsRegistry>,
}

impl<C: Capture + 'static> Switch<C> {
    pub fn new(pipeline: Pipeline, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            ports: BTreeMap::new(),
            metrics,
        }
    }

    /// Attach a port. Port ids must be unique.
    pub fn add_port(&mut self, id: PortId, capture: C) -> Result<()> {
        if self.ports.contains_key(&id) {
            return Err(Error::Config(format!("port {} already attached", id)));
        }
        self.metrics.register_port(id);
        self.ports.insert(id, Arc::new(capture));
        Ok(())
    }

    pub fn port_ids(&self) -> impl Iterator<Item = PortId> + '_ {
        self.ports.keys().copied()
    }

    /// Run until a port fails. The first port error is returned and the
    /// remaining ports are stopped.
    pub async fn run(self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(Error::Config("no ports configured".to_string()));
        }

        let ports = Arc::new(self.ports);
        let mut tasks = JoinSet::new();

        for &id in ports.keys() {
            let ports = ports.clone();
            let pipeline = self.pipeline.clone();
            let metrics = self.metrics.clone();
            tasks.spawn(async move { port_loop(id, ports, pipeline, metrics).await });
        }
        info!("Switch running on {} ports", ports.len());

        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(Error::Io(std::io::Error::other(e))),
            };
            if let Err(e) = result {
                tasks.abort_all();
                return Err(e);
            }
        }

        Ok(())
    }
}

async fn port_loop<C: Capture>(
    id: PortId,
    ports: Arc<BTreeMap<PortId, Arc<C>>>,
    pipeline: Arc<Pipeline>,
    metrics: Arc<MetricsRegistry>,
) -> Result<()> {
    let rx = ports.get(&id).ok_or(Error::UnknownPort(id))?.clone();
    let mut buf = vec![0u8; RX_BUFFER_SIZE];

    loop {
        let len = match rx.recv(&mut buf).await {
            Ok(len) => len,
            Err(e) => {
                metrics.record_rx_error(id);
                error!("Receive error on port {}: {}", id, e);
                return Err(e);
            }
        };
        metrics.record_rx(id, len);

        let (out, packet) = match pipeline.process(id, &buf[..len]) {
            Action::Forward { port, packet } | Action::Reply { port, packet } => (port, packet),
            Action::Drop(reason) => {
                debug!("Port {}: dropped frame ({:?})", id, reason);
                continue;
            }
        };

        let Some(tx) = ports.get(&out) else {
            warn!("Port {}: {}", id, Error::UnknownPort(out));
            metrics.record_tx_error(out);
            continue;
        };

        match tx.send(&packet).await {
            Ok(sent) => metrics.record_tx(out, sent),
            Err(e) => {
                metrics.record_tx_error(out);
                warn!("Failed to send on port {}: {}", out, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataplane::{new_tables, PipelineConfig};
    use crate::protocol::ethernet::FrameBuilder;
    use crate::protocol::ipv4::{self, Ipv4Builder};
    use crate::protocol::kv::{Request, DEFAULT_PORT};
    use crate::protocol::udp::UdpBuilder;
    use crate::protocol::{EtherType, MacAddr};
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use tokio::sync::{mpsc, Mutex};
    use tokio::time::timeout;

    /// In-memory port: frames pushed into `inject` are received by the
    /// switch, frames the switch sends appear on `wire`.
    struct MemPort {
        rx: Mutex<mpsc::Receiver<Vec<u8>>>,
        tx: mpsc::Sender<Vec<u8>>,
    }

    fn mem_port() -> (MemPort, mpsc::Sender<Vec<u8>>, mpsc::Receiver<Vec<u8>>) {
        let (inject, rx) = mpsc::channel(16);
        let (tx, wire) = mpsc::channel(16);
        (
            MemPort {
                rx: Mutex::new(rx),
                tx,
            },
            inject,
            wire,
        )
    }

    impl Capture for MemPort {
        async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
            let frame = self.rx.lock().await.recv().await.ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "port closed",
                ))
            })?;
            buf[..frame.len()].copy_from_slice(&frame);
            Ok(frame.len())
        }

        async fn send(&self, buf: &[u8]) -> Result<usize> {
            self.tx
                .send(buf.to_vec())
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
            Ok(buf.len())
        }
    }

    fn request(key: u32) -> Vec<u8> {
        let src = Ipv4Addr::new(10, 0, 0, 2);
        let dst = Ipv4Addr::new(10, 0, 0, 1);
        let udp = UdpBuilder::new()
            .src_port(40000)
            .dst_port(DEFAULT_PORT)
            .payload(&Request::new(key).encode())
            .build(src, dst);
        let ip = Ipv4Builder::new()
            .src_addr(src)
            .dst_addr(dst)
            .protocol(ipv4::protocol::UDP)
            .payload(&udp)
            .build();
        FrameBuilder::new()
            .dst_mac(MacAddr([0, 0, 0, 0, 0, 1]))
            .src_mac(MacAddr([0, 0, 0, 0, 0, 2]))
            .ethertype(EtherType::Ipv4 as u16)
            .payload(&ip)
            .build()
    }

    #[tokio::test]
    async fn test_hit_and_miss_leave_on_expected_ports() {
        let (control, reader) = new_tables();
        control.install_forwarding_entry(
            "10.0.0.1/32".parse().unwrap(),
            MacAddr([0, 0, 0, 0, 0, 1]),
            1,
        );
        control.install_cache_entry(1, 11);

        let metrics = Arc::new(MetricsRegistry::new());
        let pipeline = Pipeline::new(reader, PipelineConfig::default(), metrics.clone());
        let mut switch = Switch::new(pipeline, metrics.clone());

        let (port1, _inject1, mut wire1) = mem_port();
        let (port2, inject2, mut wire2) = mem_port();
        switch.add_port(1, port1).unwrap();
        switch.add_port(2, port2).unwrap();
        let running = tokio::spawn(switch.run());

        inject2.send(request(1)).await.unwrap();
        let reply = timeout(Duration::from_secs(1), wire2.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&reply[0..6], &[0, 0, 0, 0, 0, 2]);

        inject2.send(request(5)).await.unwrap();
        let forwarded = timeout(Duration::from_secs(1), wire1.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&forwarded[0..6], &[0, 0, 0, 0, 0, 1]);

        assert_eq!(metrics.cache_hits.get(), 1);
        assert_eq!(metrics.cache_misses.get(), 1);
        assert!(metrics.export().contains(&("port2_rx_packets".into(), 2)));
        running.abort();
    }

    #[tokio::test]
    async fn test_closed_port_stops_switch() {
        let (_control, reader) = new_tables();
        let metrics = Arc::new(MetricsRegistry::new());
        let pipeline = Pipeline::new(reader, PipelineConfig::default(), metrics.clone());
        let mut switch = Switch::new(pipeline, metrics);

        let (port, inject, _wire) = mem_port();
        switch.add_port(1, port).unwrap();
        drop(inject);

        let result = timeout(Duration::from_secs(1), switch.run()).await.unwrap();
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_duplicate_port_rejected() {
        let (_control, reader) = new_tables();
        let metrics = Arc::new(MetricsRegistry::new());
        let pipeline = Pipeline::new(reader, PipelineConfig::default(), metrics.clone());
        let mut switch = Switch::new(pipeline, metrics);

        let (a, _, _) = mem_port();
        let (b, _, _) = mem_port();
        switch.add_port(1, a).unwrap();
        assert!(switch.add_port(1, b).is_err());
        assert_eq!(switch.port_ids().collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_no_ports_is_error() {
        let (_control, reader) = new_tables();
        let metrics = Arc::new(MetricsRegistry::new());
        let pipeline = Pipeline::new(reader, PipelineConfig::default(), metrics.clone());
        let switch: Switch<MemPort> = Switch::new(pipeline, metrics);
        assert!(switch.run().await.is_err());
    }
}
