//! Configuration validation

use super::Config;
use crate::dataplane::{cost, Ipv4Prefix};
use crate::protocol::MacAddr;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_pipeline(config, &mut result);
    validate_ports(config, &mut result);
    validate_forwarding(config, &mut result);
    validate_cache(config, &mut result);

    result
}

fn validate_pipeline(config: &Config, result: &mut ValidationResult) {
    if config.pipeline.lookup_port == 0 {
        result.error("pipeline.lookup_port: must not be 0");
    }

    if config.pipeline.step_budget < cost::WORST_CASE {
        result.warn(format!(
            "pipeline.step_budget: {} is below the worst-case path cost {}, some packets will be dropped",
            config.pipeline.step_budget,
            cost::WORST_CASE
        ));
    }
}

fn validate_ports(config: &Config, result: &mut ValidationResult) {
    let mut ids = HashSet::new();
    let mut interfaces = HashSet::new();

    for (i, port) in config.ports.iter().enumerate() {
        if port.id == 0 {
            result.error(format!("ports[{}]: port id 0 is reserved", i));
        }
        if !ids.insert(port.id) {
            result.error(format!("ports[{}]: duplicate port id {}", i, port.id));
        }
        if !interfaces.insert(port.interface.as_str()) {
            result.error(format!(
                "ports[{}]: interface '{}' already used by another port",
                i, port.interface
            ));
        }
    }
}

fn validate_forwarding(config: &Config, result: &mut ValidationResult) {
    if config.forwarding.is_empty() {
        result.warn("forwarding: no entries, every cache miss will be dropped");
    }

    let ports: HashSet<_> = config.ports.iter().map(|p| p.id).collect();
    let mut prefixes = HashSet::new();

    for (i, entry) in config.forwarding.iter().enumerate() {
        match entry.prefix.parse::<Ipv4Prefix>() {
            Ok(prefix) => {
                if !prefixes.insert(prefix) {
                    result.warn(format!(
                        "forwarding[{}]: prefix {} listed more than once, last entry wins",
                        i, prefix
                    ));
                }
            }
            Err(e) => result.error(format!("forwarding[{}]: {}", i, e)),
        }

        if entry.next_hop_mac.parse::<MacAddr>().is_err() {
            result.error(format!(
                "forwarding[{}]: invalid next_hop_mac '{}'",
                i, entry.next_hop_mac
            ));
        }

        if !ports.contains(&entry.port) {
            result.error(format!("forwarding[{}]: port {} not defined", i, entry.port));
        }
    }
}

fn validate_cache(config: &Config, result: &mut ValidationResult) {
    let mut keys = HashSet::new();
    for (i, entry) in config.cache.iter().enumerate() {
        if !keys.insert(entry.key) {
            result.warn(format!(
                "cache[{}]: key {} listed more than once, last entry wins",
                i, entry.key
            ));
        }
    }
}
