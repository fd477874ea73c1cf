//! netcache - in-network key/value cache
//!
//! A software switch that parses every frame, answers cache hits for the
//! lookup protocol directly, forwards misses and backend answers by
//! longest-prefix match, and drops everything else.

pub mod capture;
pub mod config;
pub mod dataplane;
pub mod error;
pub mod kv;
pub mod protocol;
pub mod switch;
pub mod telemetry;

pub use error::{Error, Result};
