#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' is used for the captured reply lines of raw waits
extern crate alloc;

// --- Foundation Modules ---
pub mod config;
pub mod hal;
pub mod types;

// --- RS485 Bus Master ---
pub mod bus;

// --- Node Abstraction ---
pub mod node;

// --- Radio Uplink ---
pub mod uplink;

// --- Top-level Exports ---
pub use bus::{AccessStatus, BusEngine, PoweredBus, ReplyRing, ScanResult, ValueFormat, scan_nodes};
pub use config::{AddressingMode, BusConfig, MasterConfig, UplinkConfig};
pub use hal::{BusTransport, Clock, ConfigKey, ConfigStore, DinfoxError, NoOpWatchdog, Radio, UplinkStatus, Watchdog};
pub use node::{Board, Node, NodeManager, NodeTable, Protocol};
pub use types::{BoardId, NodeAddress};
pub use uplink::{PayloadType, TaskOutcome, UplinkContext, UplinkPayload, UplinkScheduler};
