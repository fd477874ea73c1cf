//! Key/value lookup protocol carried over UDP
//!
//! ```text
//! request  (5 bytes):  | op=0 (u8) | key (u32) |
//! response (10 bytes): | op=1 (u8) | key (u32) | valid (u8) | value (u32) |
//! ```
//!
//! All integers are big-endian. Requests are sent to the lookup port,
//! responses come back from it. `valid = 0` is the not-found marker.

use crate::{Error, Result};
use std::fmt;

/// Default UDP port of the lookup service
pub const DEFAULT_PORT: u16 = 1234;

/// Opcode of a lookup request
pub const OP_GET: u8 = 0;
/// Opcode of a lookup response
pub const OP_REPLY: u8 = 1;

pub const REQUEST_LEN: usize = 5;
pub const RESPONSE_LEN: usize = 10;

/// A lookup request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub key: u32,
}

impl Request {
    pub fn new(key: u32) -> Self {
        Self { key }
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() != REQUEST_LEN {
            return Err(Error::Parse(format!(
                "lookup request must be {} bytes, got {}",
                REQUEST_LEN,
                payload.len()
            )));
        }
        if payload[0] != OP_GET {
            return Err(Error::Parse(format!(
                "unexpected request opcode {}",
                payload[0]
            )));
        }

        Ok(Self {
            key: read_u32(&payload[1..5]),
        })
    }

    pub fn encode(&self) -> [u8; REQUEST_LEN] {
        let mut buf = [0u8; REQUEST_LEN];
        buf[0] = OP_GET;
        buf[1..5].copy_from_slice(&self.key.to_be_bytes());
        buf
    }
}

/// What a lookup resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Value(u32),
    NotFound,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value(v) => write!(f, "{}", v),
            Outcome::NotFound => write!(f, "NOTFOUND"),
        }
    }
}

/// A lookup response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub key: u32,
    pub outcome: Outcome,
}

impl Response {
    pub fn hit(key: u32, value: u32) -> Self {
        Self {
            key,
            outcome: Outcome::Value(value),
        }
    }

    pub fn not_found(key: u32) -> Self {
        Self {
            key,
            outcome: Outcome::NotFound,
        }
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() != RESPONSE_LEN {
            return Err(Error::Parse(format!(
                "lookup response must be {} bytes, got {}",
                RESPONSE_LEN,
                payload.len()
            )));
        }
        if payload[0] != OP_REPLY {
            return Err(Error::Parse(format!(
                "unexpected response opcode {}",
                payload[0]
            )));
        }

        let key = read_u32(&payload[1..5]);
        let outcome = match payload[5] {
            0 => Outcome::NotFound,
            1 => Outcome::Value(read_u32(&payload[6..10])),
            other => {
                return Err(Error::Parse(format!("invalid valid flag {}", other)));
            }
        };

        Ok(Self { key, outcome })
    }

    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        let mut buf = [0u8; RESPONSE_LEN];
        buf[0] = OP_REPLY;
        buf[1..5].copy_from_slice(&self.key.to_be_bytes());
        if let Outcome::Value(value) = self.outcome {
            buf[5] = 1;
            buf[6..10].copy_from_slice(&value.to_be_bytes());
        }
        buf
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}
