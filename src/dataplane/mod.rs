//! Data plane components
//!
//! Packet parsing, the two match tables, and the pipeline that turns each
//! received frame into a forward, a reply or a drop.

mod cache;
mod forwarding;
mod parser;
mod pipeline;
mod reply;
mod tables;

pub use cache::CacheTable;
pub use forwarding::{ForwardingEntry, ForwardingTable, Ipv4Prefix, PortId};
pub use parser::{classify, Addressing, Classification, Layer, Unrecognized};
pub use pipeline::{cost, Action, DropReason, Pipeline, PipelineConfig, DEFAULT_STEP_BUDGET};
pub use reply::synthesize_reply;
pub use tables::{new_tables, ControlPlane, TableReader};
