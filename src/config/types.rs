//! Configuration types

use crate::dataplane::{PipelineConfig, PortId, DEFAULT_STEP_BUDGET};
use crate::protocol::kv;
use crate::telemetry::LogConfig;
use serde::Deserialize;

/// Switch configuration (config.toml)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub forwarding: Vec<ForwardingConfig>,
    #[serde(default)]
    pub cache: Vec<CacheEntryConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub lookup_port: u16,
    pub step_budget: u32,
    pub verify_udp_checksum: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            lookup_port: kv::DEFAULT_PORT,
            step_budget: DEFAULT_STEP_BUDGET,
            verify_udp_checksum: true,
        }
    }
}

impl From<PipelineSection> for PipelineConfig {
    fn from(section: PipelineSection) -> Self {
        PipelineConfig {
            lookup_port: section.lookup_port,
            step_budget: section.step_budget,
            verify_udp_checksum: section.verify_udp_checksum,
        }
    }
}

/// A switch port and the interface backing it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortConfig {
    pub id: PortId,
    pub interface: String,
}

/// Forwarding table entry; prefix and MAC are checked by validation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForwardingConfig {
    pub prefix: String,
    pub next_hop_mac: String,
    pub port: PortId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CacheEntryConfig {
    pub key: u32,
    pub value: u32,
}
