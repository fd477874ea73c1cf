//! Packet pipeline
//!
//! parse -> (cache lookup) -> forwarding lookup -> action. Every packet runs
//! to a terminal [`Action`] synchronously under a fixed step budget; a packet
//! that exhausts the budget is dropped.

use super::forwarding::PortId;
use super::parser::{classify, Addressing, Classification, Unrecognized};
use super::reply::synthesize_reply;
use super::tables::TableReader;
use crate::protocol::{ethernet, ipv4, kv};
use crate::telemetry::MetricsRegistry;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::trace;

/// Step costs charged against the per-packet budget
pub mod cost {
    /// Full header walk, Ethernet through the lookup header
    pub const PARSE: u32 = 4;
    /// One table lookup
    pub const LOOKUP: u32 = 1;
    /// Rewriting a packet or synthesizing a reply
    pub const REWRITE: u32 = 2;
    /// Longest path: parse, cache miss, route lookup, rewrite
    pub const WORST_CASE: u32 = PARSE + 2 * LOOKUP + REWRITE;
}

pub const DEFAULT_STEP_BUDGET: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// UDP port of the lookup protocol
    pub lookup_port: u16,
    /// Steps a single packet may consume
    pub step_budget: u32,
    /// Off for ports behind TX checksum offload
    pub verify_udp_checksum: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookup_port: kv::DEFAULT_PORT,
            step_budget: DEFAULT_STEP_BUDGET,
            verify_udp_checksum: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Unrecognized(Unrecognized),
    NoRoute(Ipv4Addr),
    TtlExpired,
    BudgetExceeded,
}

/// Terminal decision for one packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send the rewritten packet out of `port`
    Forward { port: PortId, packet: Vec<u8> },
    /// Send a synthesized answer back out of the ingress port
    Reply { port: PortId, packet: Vec<u8> },
    Drop(DropReason),
}

struct Budget {
    remaining: u32,
}

impl Budget {
    fn new(steps: u32) -> Self {
        Self { remaining: steps }
    }

    fn charge(&mut self, steps: u32) -> Result<(), DropReason> {
        self.remaining = self
            .remaining
            .checked_sub(steps)
            .ok_or(DropReason::BudgetExceeded)?;
        Ok(())
    }
}

/// The switch's packet-processing pipeline. Shared by all ingress ports.
pub struct Pipeline {
    tables: TableReader,
    config: PipelineConfig,
    metrics: Arc<MetricsRegistry>,
}

impl Pipeline {
    pub fn new(tables: TableReader, config: PipelineConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            tables,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tables(&self) -> &TableReader {
        &self.tables
    }

    /// Process one frame received on `ingress`
    pub fn process(&self, ingress: PortId, packet: &[u8]) -> Action {
        let action = self.run(ingress, packet).unwrap_or_else(Action::Drop);

        match &action {
            Action::Forward { port, .. } => {
                trace!("port {}: forward to port {}", ingress, port);
                self.metrics.packets_forwarded.inc();
            }
            Action::Reply { .. } => {
                trace!("port {}: cache hit, replying", ingress);
                self.metrics.replies_sent.inc();
            }
            Action::Drop(reason) => {
                self.record_drop(ingress, reason);
            }
        }

        action
    }

    fn run(&self, ingress: PortId, packet: &[u8]) -> Result<Action, DropReason> {
        let mut budget = Budget::new(self.config.step_budget);

        budget.charge(cost::PARSE)?;
        match classify(
            packet,
            self.config.lookup_port,
            self.config.verify_udp_checksum,
        ) {
            Classification::Unrecognized(reason) => Err(DropReason::Unrecognized(reason)),
            Classification::Forward(addressing) => self.forward(packet, &addressing, &mut budget),
            Classification::Lookup { addressing, key } => {
                budget.charge(cost::LOOKUP)?;
                match self.tables.lookup_cache(key) {
                    Some(value) => {
                        budget.charge(cost::REWRITE)?;
                        self.metrics.cache_hits.inc();
                        Ok(Action::Reply {
                            port: ingress,
                            packet: synthesize_reply(&addressing, key, value),
                        })
                    }
                    None => {
                        self.metrics.cache_misses.inc();
                        trace!("port {}: cache miss for key {}", ingress, key);
                        self.forward(packet, &addressing, &mut budget)
                    }
                }
            }
        }
    }

    fn forward(
        &self,
        packet: &[u8],
        addressing: &Addressing,
        budget: &mut Budget,
    ) -> Result<Action, DropReason> {
        budget.charge(cost::LOOKUP)?;
        let entry = self
            .tables
            .lookup_route(addressing.dst_ip)
            .ok_or(DropReason::NoRoute(addressing.dst_ip))?;

        budget.charge(cost::REWRITE)?;
        let mut out = packet.to_vec();
        if !ipv4::decrement_ttl(&mut out[ethernet::HEADER_SIZE..]) {
            return Err(DropReason::TtlExpired);
        }
        ethernet::set_macs(&mut out, entry.next_hop_mac, addressing.dst_mac);

        Ok(Action::Forward {
            port: entry.port,
            packet: out,
        })
    }

    fn record_drop(&self, ingress: PortId, reason: &DropReason) {
        match reason {
            DropReason::Unrecognized(why) => {
                trace!("port {}: drop, {}", ingress, why);
                self.metrics.dropped_unrecognized.inc();
            }
            DropReason::NoRoute(dst) => {
                trace!("port {}: drop, no route to {}", ingress, dst);
                self.metrics.dropped_no_route.inc();
            }
            DropReason::TtlExpired => {
                trace!("port {}: drop, TTL expired", ingress);
                self.metrics.dropped_ttl.inc();
            }
            DropReason::BudgetExceeded => {
                trace!("port {}: drop, step budget exhausted", ingress);
                self.metrics.dropped_budget.inc();
            }
        }
    }
}
