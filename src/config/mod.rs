//! Configuration management
//!
//! Loads config.toml, validates it, and installs its table entries through
//! the control plane.

mod types;
mod validation;

pub use types::*;
pub use validation::{validate, ValidationResult};

use crate::dataplane::{ControlPlane, Ipv4Prefix};
use crate::protocol::MacAddr;
use crate::{Error, Result};
use std::path::Path;
use tracing::info;

/// Load configuration from a TOML file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

/// Parse configuration from TOML text
pub fn parse(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
}

/// Install the configured forwarding and cache entries, in file order.
///
/// Every entry is checked before anything is installed, so a bad entry
/// leaves the tables untouched.
pub fn install(config: &Config, control: &ControlPlane) -> Result<()> {
    let mut routes = Vec::with_capacity(config.forwarding.len());
    for entry in &config.forwarding {
        let prefix: Ipv4Prefix = entry.prefix.parse()?;
        let mac = entry
            .next_hop_mac
            .parse::<MacAddr>()
            .map_err(|e| Error::Config(e.to_string()))?;
        routes.push((prefix, mac, entry.port));
    }

    for (prefix, mac, port) in routes {
        control.install_forwarding_entry(prefix, mac, port);
    }
    for entry in &config.cache {
        control.install_cache_entry(entry.key, entry.value);
    }

    info!(
        "Installed {} forwarding entries and {} cache entries",
        config.forwarding.len(),
        config.cache.len()
    );
    Ok(())
}
