// crates/dinfox-rs/src/config.rs
//! Static configuration of the master: bus addressing and timing, scan ranges
//! and uplink schedule. Defaults match the firmware constants.

use crate::types::{ADDRESS_LAST, NodeAddress};
use core::ops::RangeInclusive;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Interval between two polls of the reply ring.
pub const REPLY_PARSING_DELAY_MS: u32 = 10;
/// Default per-reply timeout.
pub const REPLY_TIMEOUT_MS: u32 = 100;
/// Default timeout of a whole command/reply exchange.
pub const SEQUENCE_TIMEOUT_MS: u32 = 1000;
/// Default uplink period.
pub const UPLINK_PERIOD_SECONDS: u32 = 300;
/// Default cap on the number of (node, payload type) attempts per uplink cycle.
pub const UPLINK_LOOP_MAX: u32 = 100;
/// First address of the relay-board window.
pub const RELAY_ADDRESS_FIRST: u8 = 0x70;

/// Selects the framing and addressing behaviour of the bus engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AddressingMode {
    /// Every frame carries destination and source addresses; replies are authenticated.
    MultiAddress,
    /// A single fixed peer; frames carry no address bytes.
    SingleNode,
}

/// Bus engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BusConfig {
    pub mode: AddressingMode,
    pub poll_interval_ms: u32,
    pub reply_timeout_ms: u32,
    pub sequence_timeout_ms: u32,
    /// First and last address pinged by the common-protocol scan.
    pub scan_first: u8,
    pub scan_last: u8,
    /// First and last address probed by the relay-board scan.
    pub relay_first: u8,
    pub relay_last: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            mode: AddressingMode::MultiAddress,
            poll_interval_ms: REPLY_PARSING_DELAY_MS,
            reply_timeout_ms: REPLY_TIMEOUT_MS,
            sequence_timeout_ms: SEQUENCE_TIMEOUT_MS,
            scan_first: 0,
            scan_last: ADDRESS_LAST,
            relay_first: RELAY_ADDRESS_FIRST,
            relay_last: ADDRESS_LAST,
        }
    }
}

impl BusConfig {
    pub fn with_mode(mut self, mode: AddressingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeouts(mut self, reply_timeout_ms: u32, sequence_timeout_ms: u32) -> Self {
        self.reply_timeout_ms = reply_timeout_ms;
        self.sequence_timeout_ms = sequence_timeout_ms;
        self
    }

    pub fn with_scan_range(mut self, range: RangeInclusive<u8>) -> Self {
        self.scan_first = *range.start();
        self.scan_last = (*range.end()).min(ADDRESS_LAST);
        self
    }

    pub fn with_relay_range(mut self, range: RangeInclusive<u8>) -> Self {
        self.relay_first = *range.start();
        self.relay_last = (*range.end()).min(ADDRESS_LAST);
        self
    }

    /// Addresses pinged by the common-protocol scan.
    pub fn scan_range(&self) -> impl Iterator<Item = NodeAddress> {
        (self.scan_first..=self.scan_last.min(ADDRESS_LAST)).map(NodeAddress)
    }

    /// Addresses probed by the relay-board scan.
    pub fn relay_range(&self) -> impl Iterator<Item = NodeAddress> {
        (self.relay_first..=self.relay_last.min(ADDRESS_LAST)).map(NodeAddress)
    }
}

/// Uplink scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct UplinkConfig {
    pub period_seconds: u32,
    pub loop_max: u32,
    /// Request a downlink with every uplink.
    pub bidirectional: bool,
}

impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            period_seconds: UPLINK_PERIOD_SECONDS,
            loop_max: UPLINK_LOOP_MAX,
            bidirectional: false,
        }
    }
}

/// Complete master configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MasterConfig {
    pub bus: BusConfig,
    pub uplink: UplinkConfig,
}
