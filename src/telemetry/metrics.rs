//! Metrics collection for switch statistics.
//!
//! Thread-safe counters for the pipeline's decisions and per-port traffic.

use crate::dataplane::PortId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-port statistics.
#[derive(Debug, Default)]
pub struct PortStats {
    pub rx_packets: Counter,
    pub rx_bytes: Counter,
    pub tx_packets: Counter,
    pub tx_bytes: Counter,
    pub rx_errors: Counter,
    pub tx_errors: Counter,
}

impl PortStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rx(&self, bytes: usize) {
        self.rx_packets.inc();
        self.rx_bytes.add(bytes as u64);
    }

    pub fn record_tx(&self, bytes: usize) {
        self.tx_packets.inc();
        self.tx_bytes.add(bytes as u64);
    }
}

/// Global metrics registry for the switch.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    ports: RwLock<BTreeMap<PortId, PortStats>>,

    // Cache metrics
    pub cache_hits: Counter,
    pub cache_misses: Counter,

    // Pipeline outcomes
    pub packets_forwarded: Counter,
    pub replies_sent: Counter,
    pub dropped_unrecognized: Counter,
    pub dropped_no_route: Counter,
    pub dropped_ttl: Counter,
    pub dropped_budget: Counter,

    // Table size gauges
    pub forwarding_entries: AtomicU64,
    pub cache_entries: AtomicU64,
}

impl MetricsRegistry {
    /// Creates a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a port for statistics tracking.
    pub fn register_port(&self, port: PortId) {
        self.ports.write().entry(port).or_default();
    }

    /// Records a received frame on a port.
    pub fn record_rx(&self, port: PortId, bytes: usize) {
        if let Some(stats) = self.ports.read().get(&port) {
            stats.record_rx(bytes);
        }
    }

    /// Records a transmitted frame on a port.
    pub fn record_tx(&self, port: PortId, bytes: usize) {
        if let Some(stats) = self.ports.read().get(&port) {
            stats.record_tx(bytes);
        }
    }

    pub fn record_rx_error(&self, port: PortId) {
        if let Some(stats) = self.ports.read().get(&port) {
            stats.rx_errors.inc();
        }
    }

    pub fn record_tx_error(&self, port: PortId) {
        if let Some(stats) = self.ports.read().get(&port) {
            stats.tx_errors.inc();
        }
    }

    /// Total packets dropped for any reason.
    pub fn packets_dropped(&self) -> u64 {
        self.dropped_unrecognized.get()
            + self.dropped_no_route.get()
            + self.dropped_ttl.get()
            + self.dropped_budget.get()
    }

    pub fn set_table_sizes(&self, forwarding: usize, cache: usize) {
        self.forwarding_entries
            .store(forwarding as u64, Ordering::Relaxed);
        self.cache_entries.store(cache as u64, Ordering::Relaxed);
    }

    /// Exports all metrics as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        let mut result = vec![
            ("cache_hits".into(), self.cache_hits.get()),
            ("cache_misses".into(), self.cache_misses.get()),
            ("packets_forwarded".into(), self.packets_forwarded.get()),
            ("replies_sent".into(), self.replies_sent.get()),
            (
                "dropped_unrecognized".into(),
                self.dropped_unrecognized.get(),
            ),
            ("dropped_no_route".into(), self.dropped_no_route.get()),
            ("dropped_ttl".into(), self.dropped_ttl.get()),
            ("dropped_budget".into(), self.dropped_budget.get()),
            (
                "forwarding_entries".into(),
                self.forwarding_entries.load(Ordering::Relaxed),
            ),
            (
                "cache_entries".into(),
                self.cache_entries.load(Ordering::Relaxed),
            ),
        ];

        for (port, stats) in self.ports.read().iter() {
            result.extend([
                (format!("port{}_rx_packets", port), stats.rx_packets.get()),
                (format!("port{}_rx_bytes", port), stats.rx_bytes.get()),
                (format!("port{}_tx_packets", port), stats.tx_packets.get()),
                (format!("port{}_tx_bytes", port), stats.tx_bytes.get()),
                (format!("port{}_rx_errors", port), stats.rx_errors.get()),
                (format!("port{}_tx_errors", port), stats.tx_errors.get()),
            ]);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_basic() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);

        counter.inc();
        assert_eq!(counter.get(), 1);

        counter.add(10);
        assert_eq!(counter.get(), 11);
    }

    #[test]
    fn test_port_stats() {
        let stats = PortStats::new();

        stats.record_rx(60);
        stats.record_rx(64);
        stats.record_tx(60);

        assert_eq!(stats.rx_packets.get(), 2);
        assert_eq!(stats.rx_bytes.get(), 124);
        assert_eq!(stats.tx_packets.get(), 1);
        assert_eq!(stats.tx_bytes.get(), 60);
    }

    #[test]
    fn test_unregistered_port_ignored() {
        let registry = MetricsRegistry::new();
        registry.record_rx(9, 100);
        assert!(registry.export().iter().all(|(name, _)| !name.starts_with("port9")));
    }

    #[test]
    fn test_metrics_registry() {
        let registry = MetricsRegistry::new();

        registry.register_port(1);
        registry.register_port(2);

        registry.record_rx(1, 100);
        registry.record_tx(1, 200);
        registry.record_rx(2, 50);

        registry.cache_hits.inc();
        registry.dropped_no_route.add(2);
        registry.dropped_unrecognized.inc();
        registry.set_table_sizes(2, 3);

        let metrics = registry.export();

        assert!(metrics.contains(&("cache_hits".into(), 1)));
        assert!(metrics.contains(&("forwarding_entries".into(), 2)));
        assert!(metrics.contains(&("cache_entries".into(), 3)));
        assert_eq!(registry.packets_dropped(), 3);

        assert!(metrics.contains(&("port1_rx_packets".into(), 1)));
        assert!(metrics.contains(&("port1_rx_bytes".into(), 100)));
        assert!(metrics.contains(&("port1_tx_bytes".into(), 200)));
        assert!(metrics.contains(&("port2_rx_packets".into(), 1)));
    }
}
