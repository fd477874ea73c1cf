//! Forwarding table
//!
//! Longest-prefix match over IPv4 destinations. Entries are kept in one
//! exact-match map per prefix length and probed from /32 down to /0, so a
//! lookup costs at most 33 hash probes regardless of how many entries are
//! installed.

use crate::protocol::MacAddr;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Switch port number
pub type PortId = u32;

/// IPv4 prefix, always stored as its network address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Prefix {
    network: Ipv4Addr,
    len: u8,
}

impl Ipv4Prefix {
    pub fn new(addr: Ipv4Addr, len: u8) -> Result<Self> {
        if len > 32 {
            return Err(Error::Config(format!("prefix length {} exceeds 32", len)));
        }
        let network = Ipv4Addr::from(u32::from(addr) & mask(len));
        Ok(Self { network, len })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask(self.len) == u32::from(self.network)
    }
}

impl fmt::Display for Ipv4Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

impl FromStr for Ipv4Prefix {
    type Err = Error;

    /// Parse "a.b.c.d/len"
    fn from_str(s: &str) -> Result<Self> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| Error::Config(format!("prefix '{}' missing prefix length", s)))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| Error::Config(format!("invalid IPv4 address in '{}'", s)))?;
        let len: u8 = len
            .parse()
            .map_err(|_| Error::Config(format!("invalid prefix length in '{}'", s)))?;
        Self::new(addr, len)
    }
}

fn mask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        !0u32 << (32 - len)
    }
}

/// Where to send packets for a prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingEntry {
    pub prefix: Ipv4Prefix,
    pub next_hop_mac: MacAddr,
    pub port: PortId,
}

/// Longest-prefix-match forwarding table
#[derive(Debug, Clone, Default)]
pub struct ForwardingTable {
    by_len: BTreeMap<u8, HashMap<u32, ForwardingEntry>>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an entry, replacing any entry for the exact same prefix.
    /// Returns the replaced entry.
    pub fn insert(&mut self, entry: ForwardingEntry) -> Option<ForwardingEntry> {
        self.by_len
            .entry(entry.prefix.prefix_len())
            .or_default()
            .insert(u32::from(entry.prefix.network()), entry)
    }

    /// Lookup using longest prefix match
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&ForwardingEntry> {
        let bits = u32::from(addr);
        self.by_len
            .iter()
            .rev()
            .find_map(|(len, entries)| entries.get(&(bits & mask(*len))))
    }

    pub fn entries(&self) -> impl Iterator<Item = &ForwardingEntry> {
        self.by_len.values().rev().flat_map(|entries| entries.values())
    }

    pub fn len(&self) -> usize {
        self.by_len.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
