// crates/dinfox-rs/src/uplink/payload.rs
use super::bits::{BitReader, BitWriter};
use crate::hal::DinfoxError;
use crate::node::NodeData;
use crate::node::registers::{
    REGISTER_RESET_REASON, REGISTER_SW_VERSION_COMMIT_ID, REGISTER_SW_VERSION_COMMIT_INDEX,
    REGISTER_SW_VERSION_DIRTY_FLAG, REGISTER_SW_VERSION_MAJOR, REGISTER_SW_VERSION_MINOR,
};
use heapless::Vec;

/// Maximum size of an uplink frame.
pub const UPLINK_PAYLOAD_SIZE_MAX: usize = 12;
pub const UPLINK_HEADER_SIZE: usize = 2;
pub const UPLINK_HEADER_INDEX_BOARD_ID: usize = 0;
pub const UPLINK_HEADER_INDEX_NODE_ADDRESS: usize = 1;
/// Maximum size of the record following the header.
pub const UPLINK_BODY_SIZE_MAX: usize = UPLINK_PAYLOAD_SIZE_MAX - UPLINK_HEADER_SIZE;
pub const STARTUP_PAYLOAD_SIZE: usize = 8;

/// Kind of record sent for a node. The uplink cycle visits them in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    Startup,
    Monitoring,
    Data,
}

impl PayloadType {
    pub const ALL: [PayloadType; 3] = [PayloadType::Startup, PayloadType::Monitoring, PayloadType::Data];

    /// Next type, `None` after the last one.
    pub fn next(&self) -> Option<PayloadType> {
        match self {
            PayloadType::Startup => Some(PayloadType::Monitoring),
            PayloadType::Monitoring => Some(PayloadType::Data),
            PayloadType::Data => None,
        }
    }
}

/// Common header of every uplink frame.
///
/// Wire order is board id first, then node address. Earlier DinFox master
/// firmware packed the node address first; a backend decoding those frames
/// must swap the two bytes for this layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UplinkHeader {
    pub board_id: u8,
    /// Bus address, or the broadcast marker on a single-node bus.
    pub node_address: u8,
}

impl UplinkHeader {
    pub fn decode(frame: &[u8]) -> Result<Self, DinfoxError> {
        match frame {
            [board_id, node_address, ..] => Ok(Self {
                board_id: *board_id,
                node_address: *node_address,
            }),
            _ => Err(DinfoxError::ParseError),
        }
    }
}

/// Startup record, identical for every board of the common protocol.
///
/// Layout (64 bits): reset reason 8, major 8, minor 8, commit index 8,
/// commit id 28, dirty flag 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupPayload {
    pub reset_reason: u8,
    pub major_version: u8,
    pub minor_version: u8,
    pub commit_index: u8,
    pub commit_id: u32,
    pub dirty_flag: u8,
}

impl StartupPayload {
    pub fn from_registers(data: &NodeData) -> Self {
        Self {
            reset_reason: data.register(REGISTER_RESET_REASON) as u8,
            major_version: data.register(REGISTER_SW_VERSION_MAJOR) as u8,
            minor_version: data.register(REGISTER_SW_VERSION_MINOR) as u8,
            commit_index: data.register(REGISTER_SW_VERSION_COMMIT_INDEX) as u8,
            commit_id: data.register(REGISTER_SW_VERSION_COMMIT_ID) as u32,
            dirty_flag: data.register(REGISTER_SW_VERSION_DIRTY_FLAG) as u8,
        }
    }

    pub fn encode(&self, writer: &mut BitWriter<'_>) -> Result<(), DinfoxError> {
        writer.write(self.reset_reason as u32, 8)?;
        writer.write(self.major_version as u32, 8)?;
        writer.write(self.minor_version as u32, 8)?;
        writer.write(self.commit_index as u32, 8)?;
        writer.write(self.commit_id, 28)?;
        writer.write(self.dirty_flag as u32, 4)
    }

    /// Decodes the record body (header already stripped).
    pub fn decode(body: &[u8]) -> Result<Self, DinfoxError> {
        if body.len() != STARTUP_PAYLOAD_SIZE {
            return Err(DinfoxError::ParseError);
        }
        let mut reader = BitReader::new(body);
        Ok(Self {
            reset_reason: reader.read(8)? as u8,
            major_version: reader.read(8)? as u8,
            minor_version: reader.read(8)? as u8,
            commit_index: reader.read(8)? as u8,
            commit_id: reader.read(28)?,
            dirty_flag: reader.read(4)? as u8,
        })
    }
}

/// A complete uplink frame: header and record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkPayload {
    payload_type: PayloadType,
    frame: Vec<u8, UPLINK_PAYLOAD_SIZE_MAX>,
}

impl UplinkPayload {
    pub fn new(payload_type: PayloadType, header: UplinkHeader, body: &[u8]) -> Result<Self, DinfoxError> {
        if body.is_empty() {
            return Err(DinfoxError::PayloadEmpty);
        }
        let mut header_bytes = [0u8; UPLINK_HEADER_SIZE];
        header_bytes[UPLINK_HEADER_INDEX_BOARD_ID] = header.board_id;
        header_bytes[UPLINK_HEADER_INDEX_NODE_ADDRESS] = header.node_address;
        let mut frame = Vec::new();
        frame
            .extend_from_slice(&header_bytes)
            .map_err(|_| DinfoxError::BufferOverflow)?;
        frame.extend_from_slice(body).map_err(|_| DinfoxError::BufferOverflow)?;
        Ok(Self { payload_type, frame })
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    pub fn header(&self) -> UplinkHeader {
        UplinkHeader {
            board_id: self.frame[UPLINK_HEADER_INDEX_BOARD_ID],
            node_address: self.frame[UPLINK_HEADER_INDEX_NODE_ADDRESS],
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.frame[UPLINK_HEADER_SIZE..]
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}
