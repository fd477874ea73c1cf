//! In-memory key/value store

use crate::{Error, Result};
use std::collections::BTreeMap;

/// Authoritative key/value store held by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KvStore {
    entries: BTreeMap<u32, u32>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from "key=value" arguments. Later duplicates win.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::new();
        for pair in pairs {
            let (key, value) = parse_pair(pair.as_ref())?;
            store.insert(key, value);
        }
        Ok(store)
    }

    pub fn insert(&mut self, key: u32, value: u32) -> Option<u32> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: u32) -> Option<u32> {
        self.entries.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

impl FromIterator<(u32, u32)> for KvStore {
    fn from_iter<T: IntoIterator<Item = (u32, u32)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn parse_pair(pair: &str) -> Result<(u32, u32)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| Error::Parse(format!("expected key=value, got '{}'", pair)))?;
    let key = key
        .trim()
        .parse()
        .map_err(|_| Error::Parse(format!("invalid key in '{}'", pair)))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| Error::Parse(format!("invalid value in '{}'", pair)))?;
    Ok((key, value))
}
