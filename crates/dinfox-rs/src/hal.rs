use crate::types::NodeAddressError;
use core::fmt;

/// Defines a portable, descriptive Error type for the DinFox master stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DinfoxError {
    /// A mandatory input (command body, payload) was empty.
    NullInput,
    /// A register, string data index, node index or bus address is out of range.
    InvalidAddress,
    /// The board type does not provide the requested capability.
    NotSupported,
    /// Unexpected responder or unknown protocol variant.
    ProtocolMismatch,
    /// No reply line was received before the per-reply timeout.
    ReplyTimeout,
    /// The whole exchange exceeded the sequence timeout.
    SequenceTimeout,
    /// A reply was received but not in the expected shape, or an explicit "ERROR" reply.
    ParseError,
    /// The underlying transport failed to send or receive.
    TransportFailure,
    /// The board produced no uplink data for the requested payload type.
    PayloadEmpty,
    /// A command or payload exceeds its fixed capacity.
    BufferOverflow,
    /// A bounded loop (scan, uplink cycle) hit its safety cap.
    IterationLimitExceeded,
    /// No radio gateway board was discovered on the bus.
    NoRadioModule,
    /// The radio gateway refused the uplink frame.
    UplinkRejected,
    /// The persistent configuration store could not be read.
    ConfigStore,
}

impl fmt::Display for DinfoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullInput => write!(f, "A mandatory input is empty"),
            Self::InvalidAddress => write!(f, "Address or index is out of range"),
            Self::NotSupported => write!(f, "Operation not supported by this board"),
            Self::ProtocolMismatch => write!(f, "Unexpected responder or protocol variant"),
            Self::ReplyTimeout => write!(f, "No reply received before timeout"),
            Self::SequenceTimeout => write!(f, "Exchange exceeded the sequence timeout"),
            Self::ParseError => write!(f, "Reply received but could not be parsed"),
            Self::TransportFailure => write!(f, "Bus transport failure"),
            Self::PayloadEmpty => write!(f, "No uplink data for this payload type"),
            Self::BufferOverflow => write!(f, "Buffer capacity exceeded"),
            Self::IterationLimitExceeded => write!(f, "Loop iteration limit exceeded"),
            Self::NoRadioModule => write!(f, "No radio gateway on the bus"),
            Self::UplinkRejected => write!(f, "Radio gateway rejected the uplink"),
            Self::ConfigStore => write!(f, "Configuration store read failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DinfoxError {}

// --- From Implementations for Error Conversion ---

impl From<NodeAddressError> for DinfoxError {
    fn from(_: NodeAddressError) -> Self {
        DinfoxError::InvalidAddress
    }
}

impl From<core::fmt::Error> for DinfoxError {
    fn from(_: core::fmt::Error) -> Self {
        DinfoxError::BufferOverflow
    }
}

/// Hardware Abstraction Layer (HAL) for the half-duplex RS485 bus.
///
/// Only the transmit path lives here. The receive path is the interrupt (or
/// reader thread) of the implementation, which must push every received byte
/// into [`crate::bus::ReplyRing::on_byte_received`]. In multi-address mode the
/// implementation strips the destination byte of inbound frames, so the ring
/// sees `[source, payload..., '\r']`.
pub trait BusTransport {
    /// Transmits raw bytes. Must return within a bounded time.
    fn send(&mut self, bytes: &[u8]) -> Result<(), DinfoxError>;

    /// Enables the receiver (and its interrupt).
    fn enable_rx(&mut self);

    /// Disables the receiver, used to avoid self-echo while transmitting.
    fn disable_rx(&mut self);

    /// Powers the bus interface (transceiver supply) on.
    fn power_on(&mut self) -> Result<(), DinfoxError>;

    /// Powers the bus interface off. Infallible so it can run from a drop guard.
    fn power_off(&mut self);
}

/// Time source used by the reply-wait loop.
pub trait Clock {
    /// Blocks for the given number of milliseconds.
    fn delay_ms(&mut self, ms: u32) -> Result<(), DinfoxError>;
}

/// Independent watchdog, reloaded from every long-running loop.
pub trait Watchdog {
    fn reload(&mut self);
}

/// Outcome of an uplink transmission accepted by the radio collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UplinkStatus {
    /// The gateway acknowledged and transmitted the frame.
    pub accepted: bool,
    /// Downlink bytes, present only for bidirectional requests that got one.
    pub downlink: Option<[u8; 8]>,
}

/// The low-power wide-area radio, treated as an opaque frame sender.
pub trait Radio {
    fn send_uplink(&mut self, payload: &[u8], bidirectional: bool) -> Result<UplinkStatus, DinfoxError>;
}

/// Keys readable from the persistent configuration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    /// The local (master) RS485 address.
    BusAddress,
}

/// A trait for abstracting the non-volatile storage of node parameters.
pub trait ConfigStore {
    fn read_byte(&mut self, key: ConfigKey) -> Result<u8, DinfoxError>;
}

/// A `no_std` compatible watchdog that does nothing.
pub struct NoOpWatchdog;
impl Watchdog for NoOpWatchdog {
    fn reload(&mut self) {}
}
