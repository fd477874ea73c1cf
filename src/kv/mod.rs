//! Lookup-protocol endpoints
//!
//! The backend server holding the authoritative store and the client used
//! to query it through the switch. Both speak the codec in
//! [`crate::protocol::kv`] over plain UDP sockets.

mod client;
mod server;
mod store;

pub use client::{lookup, probe_payload, send_other_traffic, LookupResult, OTHER_TRAFFIC_PORT};
pub use server::Backend;
pub use store::KvStore;
