// crates/dinfox-rs/src/node/board.rs
use super::data::{NodeData, STRING_BUFFER_SIZE};
use super::{bpsm, lvrm, r4s8cr, uhfm};
use crate::bus::{AccessStatus, Reply, ValueFormat};
use crate::hal::DinfoxError;
use crate::types::BoardId;
use crate::uplink::{BitWriter, PayloadType};
use heapless::String;
use log::warn;

/// Bus protocol spoken by a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// `RS`, `RS$R=`, `RS$W=` text protocol with common registers.
    Common,
    /// Relay-board protocol (`ST`, `R<n>=`), multi-address bus only.
    Relay,
}

/// Value of one register access.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegisterRead {
    pub status: AccessStatus,
    pub value: i32,
    /// Value field as received, e.g. `0A` for a hexadecimal register.
    pub text: String<STRING_BUFFER_SIZE>,
}

impl RegisterRead {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Keeps the value field of a successful reply as text.
    pub(crate) fn from_reply(reply: &Reply) -> Result<Self, DinfoxError> {
        let mut text = String::new();
        if reply.status.is_success() {
            text.push_str(reply.raw_text()).map_err(|_| {
                warn!("[NODE] Register value {:?} does not fit the text buffer.", reply.raw_text());
                DinfoxError::BufferOverflow
            })?;
        }
        Ok(Self {
            status: reply.status,
            value: reply.value,
            text,
        })
    }
}

/// Register reads routed to one node, whatever its protocol.
pub trait RegisterAccess {
    fn read_register(&mut self, register_address: u8, format: ValueFormat) -> Result<RegisterRead, DinfoxError>;
}

/// Capabilities of one board type.
///
/// Absent capabilities keep the default methods, which report `NotSupported`
/// or an empty register/string data range.
pub trait Board: Sync {
    fn name(&self) -> &'static str;

    fn protocol(&self) -> Protocol {
        Protocol::Common
    }

    /// Exclusive upper bound of the register addresses.
    fn last_register_address(&self) -> u8 {
        0
    }

    /// Exclusive upper bound of the string data indexes.
    fn last_string_data_index(&self) -> u8 {
        0
    }

    /// Format of a board-specific register.
    fn register_format(&self, _register_address: u8) -> Option<ValueFormat> {
        None
    }

    /// Refreshes a board-specific string data slot.
    fn update_specific_data(
        &self,
        _string_data_index: u8,
        _access: &mut dyn RegisterAccess,
        _data: &mut NodeData,
    ) -> Result<(), DinfoxError> {
        Err(DinfoxError::NotSupported)
    }

    /// Packs the monitoring or data record of the board from the register cache.
    fn encode_payload(
        &self,
        _payload_type: PayloadType,
        _data: &NodeData,
        _writer: &mut BitWriter<'_>,
    ) -> Result<(), DinfoxError> {
        Err(DinfoxError::NotSupported)
    }
}

/// Board known by name only.
pub struct NameOnly(&'static str);

impl Board for NameOnly {
    fn name(&self) -> &'static str {
        self.0
    }
}

static DDRM: NameOnly = NameOnly("DDRM");
static GPSM: NameOnly = NameOnly("GPSM");
static SM: NameOnly = NameOnly("SM");
static DIM: NameOnly = NameOnly("DIM");
static RRM: NameOnly = NameOnly("RRM");
static DMM: NameOnly = NameOnly("DMM");
static MPMCM: NameOnly = NameOnly("MPMCM");

impl BoardId {
    /// Capability descriptor of the board type.
    pub fn board(&self) -> Result<&'static dyn Board, DinfoxError> {
        let board: &'static dyn Board = match self {
            BoardId::Lvrm => &lvrm::LVRM,
            BoardId::Bpsm => &bpsm::BPSM,
            BoardId::Ddrm => &DDRM,
            BoardId::Uhfm => &uhfm::UHFM,
            BoardId::Gpsm => &GPSM,
            BoardId::Sm => &SM,
            BoardId::Dim => &DIM,
            BoardId::Rrm => &RRM,
            BoardId::Dmm => &DMM,
            BoardId::Mpmcm => &MPMCM,
            BoardId::R4s8cr => &r4s8cr::R4S8CR,
            BoardId::Unknown => return Err(DinfoxError::NotSupported),
        };
        Ok(board)
    }
}
