// crates/dinfox-rs/src/bus/mod.rs
//! RS485 bus master: reply reception, command framing and node discovery.

pub mod addressing;
pub mod command;
pub mod engine;
pub mod parser;
pub mod power;
pub mod reply;
pub mod scan;

pub use addressing::Frame;
pub use engine::{AccessStatus, BusEngine, RawControl, Reply, ReplyKind, ReplyRequest};
pub use parser::{ValueFormat, parse_value, write_value};
pub use power::PoweredBus;
pub use reply::{REPLY_BUFFER_DEPTH, REPLY_BUFFER_SIZE_BYTES, ReplyLine, ReplyRing};
pub use scan::{ScanResult, scan_nodes};
