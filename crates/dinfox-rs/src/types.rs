use core::convert::TryFrom;
use core::fmt;

// --- Bus Constants ---

/// Line terminator closing every command and every reply on the bus.
pub const FRAME_END: u8 = b'\r';

/// Highest valid RS485 node address (7-bit addressing).
pub const ADDRESS_LAST: u8 = 0x7F;

/// Bit set on the destination byte of every outbound frame in multi-address mode.
pub const DESTINATION_ADDRESS_MARKER: u8 = 0x80;

/// Node address field written in uplink records when no bus address exists (single-node mode).
pub const NODE_ADDRESS_BROADCAST: u8 = 0xFF;

/// Index of the responder's address inside an inbound frame (multi-address mode).
pub const FRAME_FIELD_INDEX_SOURCE_ADDRESS: usize = 0;

/// Index of the first payload byte inside an inbound frame (multi-address mode).
pub const FRAME_FIELD_INDEX_DATA: usize = 1;

/// Maximum number of nodes tracked by the master, master board included.
pub const NODES_LIST_SIZE_MAX: usize = 32;

/// Represents an RS485 node address, wrapping a `u8` to ensure type safety.
///
/// Valid addresses are in the range 0-127. This newtype prevents accidental use
/// of the destination marker bit or the broadcast marker where a real bus
/// address is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeAddress(pub u8);

/// Error type for invalid node address creation.
#[derive(Debug, PartialEq, Eq)]
pub enum NodeAddressError {
    /// Address is outside the valid range (0-127).
    InvalidRange(u8),
}

impl fmt::Display for NodeAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAddressError::InvalidRange(value) => {
                write!(f, "Invalid node address {:#04x}. Valid range is 0x00-0x7F.", value)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NodeAddressError {}

impl TryFrom<u8> for NodeAddress {
    type Error = NodeAddressError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=ADDRESS_LAST => Ok(NodeAddress(value)),
            _ => Err(NodeAddressError::InvalidRange(value)),
        }
    }
}

impl From<NodeAddress> for u8 {
    fn from(address: NodeAddress) -> Self {
        address.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

// --- Board Identifiers ---

/// Identifies the type of a board connected to the bus.
///
/// The numeric values are the ones returned by the board-id register and the
/// ones written in the first byte of every uplink record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BoardId {
    Lvrm = 0,
    Bpsm = 1,
    Ddrm = 2,
    Uhfm = 3,
    Gpsm = 4,
    Sm = 5,
    Dim = 6,
    Rrm = 7,
    Dmm = 8,
    Mpmcm = 9,
    R4s8cr = 10,
    /// Board answered the ping but its identity could not be read or is not known.
    Unknown = 0xFF,
}

impl BoardId {
    /// All known board types, in identifier order.
    pub const KNOWN: [BoardId; 11] = [
        BoardId::Lvrm,
        BoardId::Bpsm,
        BoardId::Ddrm,
        BoardId::Uhfm,
        BoardId::Gpsm,
        BoardId::Sm,
        BoardId::Dim,
        BoardId::Rrm,
        BoardId::Dmm,
        BoardId::Mpmcm,
        BoardId::R4s8cr,
    ];

    pub fn is_known(&self) -> bool {
        *self != BoardId::Unknown
    }
}

impl From<u8> for BoardId {
    /// Unrecognised identifiers map to `BoardId::Unknown`.
    fn from(value: u8) -> Self {
        BoardId::KNOWN
            .iter()
            .copied()
            .find(|id| *id as u8 == value)
            .unwrap_or(BoardId::Unknown)
    }
}

impl From<BoardId> for u8 {
    fn from(id: BoardId) -> Self {
        id as u8
    }
}
