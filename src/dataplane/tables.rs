//! Shared match tables
//!
//! Both tables are published as immutable snapshots. The control plane
//! copies the current snapshot, applies its change and swaps the new one in,
//! so a data-plane lookup observes an installation either completely or not
//! at all. Writers are serialized by a mutex; readers never take it.
//!
//! The two capabilities are separate types: [`ControlPlane`] can install,
//! [`TableReader`] can only look up.

use super::cache::CacheTable;
use super::forwarding::{ForwardingEntry, ForwardingTable, Ipv4Prefix, PortId};
use crate::protocol::MacAddr;
use crate::telemetry::MetricsRegistry;
use arc_swap::{ArcSwap, Guard};
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct Tables {
    forwarding: ArcSwap<ForwardingTable>,
    cache: ArcSwap<CacheTable>,
    writer: Mutex<()>,
}

/// Create an empty pair of tables and the two handles onto them
pub fn new_tables() -> (ControlPlane, TableReader) {
    let tables = Arc::new(Tables {
        forwarding: ArcSwap::from_pointee(ForwardingTable::new()),
        cache: ArcSwap::from_pointee(CacheTable::new()),
        writer: Mutex::new(()),
    });

    (
        ControlPlane {
            tables: tables.clone(),
            metrics: None,
        },
        TableReader { tables },
    )
}

/// Installer handle, held by the control-plane actor only
#[derive(Debug)]
pub struct ControlPlane {
    tables: Arc<Tables>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ControlPlane {
    /// Keep the table-size gauges of `metrics` current on every change
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self.publish_sizes();
        self
    }

    /// Install or replace the entry for `prefix`
    pub fn install_forwarding_entry(&self, prefix: Ipv4Prefix, next_hop_mac: MacAddr, port: PortId) {
        let _writer = self.tables.writer.lock();

        let mut table = ForwardingTable::clone(&self.tables.forwarding.load());
        let entry = ForwardingEntry {
            prefix,
            next_hop_mac,
            port,
        };
        match table.insert(entry) {
            Some(old) if old == entry => debug!("Forwarding entry {} unchanged", prefix),
            Some(_) => debug!("Replaced forwarding entry {} -> port {}", prefix, port),
            None => debug!("Installed forwarding entry {} -> port {} ({})", prefix, port, next_hop_mac),
        }
        self.tables.forwarding.store(Arc::new(table));
        self.publish_sizes();
    }

    /// Install or overwrite the cached value for `key`
    pub fn install_cache_entry(&self, key: u32, value: u32) {
        let _writer = self.tables.writer.lock();

        let mut table = CacheTable::clone(&self.tables.cache.load());
        if let Some(old) = table.insert(key, value) {
            debug!("Cache entry {} overwritten: {} -> {}", key, old, value);
        } else {
            debug!("Installed cache entry {} = {}", key, value);
        }
        self.tables.cache.store(Arc::new(table));
        self.publish_sizes();
    }

    /// Clear both tables, as on a device reset
    pub fn reset(&self) {
        let _writer = self.tables.writer.lock();
        self.tables.forwarding.store(Arc::new(ForwardingTable::new()));
        self.tables.cache.store(Arc::new(CacheTable::new()));
        self.publish_sizes();
        debug!("Tables reset");
    }

    fn publish_sizes(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.set_table_sizes(
                self.tables.forwarding.load().len(),
                self.tables.cache.load().len(),
            );
        }
    }
}

/// Read-only handle used on the packet path
#[derive(Debug, Clone)]
pub struct TableReader {
    tables: Arc<Tables>,
}

impl TableReader {
    /// Longest-prefix match against the current forwarding snapshot
    pub fn lookup_route(&self, addr: Ipv4Addr) -> Option<ForwardingEntry> {
        self.tables.forwarding.load().lookup(addr).copied()
    }

    /// Exact match against the current cache snapshot
    pub fn lookup_cache(&self, key: u32) -> Option<u32> {
        self.tables.cache.load().lookup(key)
    }

    pub fn forwarding(&self) -> Guard<Arc<ForwardingTable>> {
        self.tables.forwarding.load()
    }

    pub fn cache(&self) -> Guard<Arc<CacheTable>> {
        self.tables.cache.load()
    }
}
