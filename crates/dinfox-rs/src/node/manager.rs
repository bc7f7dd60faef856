// crates/dinfox-rs/src/node/manager.rs
use super::board::{Board, Protocol, RegisterAccess, RegisterRead};
use super::common::update_common_data;
use super::data::{NodeData, StringDataSlot};
use super::r4s8cr;
use super::registers::{COMMON_REGISTER_LAST, COMMON_STRING_DATA_LAST, common_register_format};
use super::table::{Node, NodeTable};
use crate::bus::{AccessStatus, BusEngine, ScanResult, ValueFormat, scan_nodes};
use crate::hal::{BusTransport, Clock, ConfigStore, DinfoxError, Watchdog};
use crate::types::{BoardId, NODE_ADDRESS_BROADCAST, NodeAddress};
use crate::uplink::{BitWriter, PayloadType, StartupPayload, UPLINK_BODY_SIZE_MAX, UplinkHeader, UplinkPayload};
use log::{debug, info, trace};

/// Routes register reads of one node to the bus, by protocol.
struct NodeAccess<'e, 'r, T: BusTransport, C: Clock> {
    engine: &'e mut BusEngine<'r, T, C>,
    address: Option<NodeAddress>,
    protocol: Protocol,
}

impl<T: BusTransport, C: Clock> RegisterAccess for NodeAccess<'_, '_, T, C> {
    fn read_register(&mut self, register_address: u8, format: ValueFormat) -> Result<RegisterRead, DinfoxError> {
        match self.protocol {
            Protocol::Common => {
                let reply = self.engine.read_register(self.address, register_address, format)?;
                RegisterRead::from_reply(&reply)
            }
            Protocol::Relay => {
                let address = self.address.ok_or(DinfoxError::ProtocolMismatch)?;
                r4s8cr::read_register(self.engine, address, register_address)
            }
        }
    }
}

/// Node table, string data and register caches of the master.
///
/// The caches hold the data of the last refreshed node only; every
/// [`NodeManager::update_all_string_data`] call flushes them first.
#[derive(Debug, Clone, Default)]
pub struct NodeManager {
    nodes: NodeTable,
    gateway: Option<usize>,
    data: NodeData,
}

impl NodeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager over an already known node table.
    pub fn from_table(nodes: NodeTable) -> Self {
        let gateway = nodes.find_board(BoardId::Uhfm).map(|(index, _)| index);
        Self {
            nodes,
            gateway,
            data: NodeData::new(),
        }
    }

    /// Rebuilds the node table from a bus scan.
    pub fn scan<T, C, S, W>(
        &mut self,
        engine: &mut BusEngine<'_, T, C>,
        store: &mut S,
        watchdog: &mut W,
    ) -> Result<ScanResult, DinfoxError>
    where
        T: BusTransport,
        C: Clock,
        S: ConfigStore,
        W: Watchdog,
    {
        let result = scan_nodes(engine, store, watchdog)?;
        self.nodes = result.nodes.clone();
        self.gateway = result.gateway;
        self.data.flush();
        Ok(result)
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    /// Table index of the radio gateway board.
    pub fn gateway(&self) -> Option<usize> {
        self.gateway
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn node(&self, node_index: usize) -> Result<Node, DinfoxError> {
        self.nodes.get(node_index).copied()
    }

    fn board(&self, node_index: usize) -> Result<(Node, &'static dyn Board), DinfoxError> {
        let node = self.node(node_index)?;
        Ok((node, node.board_id.board()?))
    }

    pub fn board_name(&self, node_index: usize) -> Result<&'static str, DinfoxError> {
        let (_, board) = self.board(node_index)?;
        Ok(board.name())
    }

    pub fn last_string_data_index(&self, node_index: usize) -> Result<u8, DinfoxError> {
        let (_, board) = self.board(node_index)?;
        Ok(board.last_string_data_index())
    }

    /// Checks a register address against the board map and returns its format.
    fn register_format(board: &dyn Board, register_address: u8) -> Result<ValueFormat, DinfoxError> {
        let last = board.last_register_address();
        if last == 0 {
            return Err(DinfoxError::NotSupported);
        }
        if register_address >= last {
            return Err(DinfoxError::InvalidAddress);
        }
        let format = match board.protocol() {
            Protocol::Common if register_address < COMMON_REGISTER_LAST => common_register_format(register_address),
            _ => board.register_format(register_address),
        };
        format.ok_or(DinfoxError::InvalidAddress)
    }

    pub fn read_register<T: BusTransport, C: Clock>(
        &self,
        engine: &mut BusEngine<'_, T, C>,
        node_index: usize,
        register_address: u8,
    ) -> Result<RegisterRead, DinfoxError> {
        let (node, board) = self.board(node_index)?;
        let format = Self::register_format(board, register_address)?;
        let mut access = NodeAccess {
            engine,
            address: node.address,
            protocol: board.protocol(),
        };
        access.read_register(register_address, format)
    }

    pub fn write_register<T: BusTransport, C: Clock>(
        &self,
        engine: &mut BusEngine<'_, T, C>,
        node_index: usize,
        register_address: u8,
        value: i32,
    ) -> Result<AccessStatus, DinfoxError> {
        let (node, board) = self.board(node_index)?;
        let format = Self::register_format(board, register_address)?;
        let status = match board.protocol() {
            Protocol::Common => {
                engine
                    .write_register(node.address, register_address, value, format)?
                    .status
            }
            Protocol::Relay => {
                let address = node.address.ok_or(DinfoxError::ProtocolMismatch)?;
                r4s8cr::write_register(engine, address, register_address, value)?
            }
        };
        debug!(
            "[NODE] Write 0x{:02X}={} on {} {:?}: {:?}.",
            register_address,
            value,
            board.name(),
            node.address,
            status
        );
        Ok(status)
    }

    /// Refreshes one string data slot of a node.
    pub fn update_string_data<T: BusTransport, C: Clock>(
        &mut self,
        engine: &mut BusEngine<'_, T, C>,
        node_index: usize,
        string_data_index: u8,
    ) -> Result<(), DinfoxError> {
        let (node, board) = self.board(node_index)?;
        let last = board.last_string_data_index();
        if last == 0 {
            return Err(DinfoxError::NotSupported);
        }
        if string_data_index >= last {
            return Err(DinfoxError::InvalidAddress);
        }
        let protocol = board.protocol();
        let mut access = NodeAccess {
            engine,
            address: node.address,
            protocol,
        };
        if protocol == Protocol::Common && string_data_index < COMMON_STRING_DATA_LAST {
            update_common_data(string_data_index, &mut access, &mut self.data)
        } else {
            board.update_specific_data(string_data_index, &mut access, &mut self.data)
        }
    }

    /// Flushes the caches and refreshes every string data slot of a node.
    pub fn update_all_string_data<T: BusTransport, C: Clock>(
        &mut self,
        engine: &mut BusEngine<'_, T, C>,
        node_index: usize,
    ) -> Result<(), DinfoxError> {
        self.data.flush();
        let last = self.last_string_data_index(node_index)?;
        if last == 0 {
            return Err(DinfoxError::NotSupported);
        }
        for string_data_index in 0..last {
            self.update_string_data(engine, node_index, string_data_index)?;
        }
        trace!("[NODE] Refreshed {} slot(s) of node {}.", last, node_index);
        Ok(())
    }

    pub fn read_string_data(&self, node_index: usize, string_data_index: u8) -> Result<&StringDataSlot, DinfoxError> {
        if string_data_index >= self.last_string_data_index(node_index)? {
            return Err(DinfoxError::InvalidAddress);
        }
        self.data.slot(string_data_index)
    }

    /// Writes the register behind a board-specific slot, then refreshes the slot.
    ///
    /// Common slots are read-only.
    pub fn write_string_data<T: BusTransport, C: Clock>(
        &mut self,
        engine: &mut BusEngine<'_, T, C>,
        node_index: usize,
        string_data_index: u8,
        value: i32,
    ) -> Result<AccessStatus, DinfoxError> {
        let (_, board) = self.board(node_index)?;
        if string_data_index >= board.last_string_data_index() {
            return Err(DinfoxError::InvalidAddress);
        }
        let register_address = match board.protocol() {
            Protocol::Common if string_data_index < COMMON_STRING_DATA_LAST => {
                return Err(DinfoxError::NotSupported);
            }
            Protocol::Common => string_data_index + COMMON_REGISTER_LAST - COMMON_STRING_DATA_LAST,
            Protocol::Relay => string_data_index,
        };
        let status = self.write_register(engine, node_index, register_address, value)?;
        if status.is_success() {
            self.update_string_data(engine, node_index, string_data_index)?;
        }
        Ok(status)
    }

    /// Builds the uplink frame of a node from the register cache.
    pub fn encode_uplink_payload(&self, node_index: usize, payload_type: PayloadType) -> Result<UplinkPayload, DinfoxError> {
        let (node, board) = self.board(node_index)?;
        let header = UplinkHeader {
            board_id: node.board_id.into(),
            node_address: node.address.map(u8::from).unwrap_or(NODE_ADDRESS_BROADCAST),
        };
        let mut body = [0u8; UPLINK_BODY_SIZE_MAX];
        let mut writer = BitWriter::new(&mut body);
        match payload_type {
            PayloadType::Startup => match board.protocol() {
                Protocol::Common => StartupPayload::from_registers(&self.data).encode(&mut writer)?,
                Protocol::Relay => return Err(DinfoxError::PayloadEmpty),
            },
            _ => board.encode_payload(payload_type, &self.data, &mut writer)?,
        }
        let size = writer.len();
        if size == 0 {
            return Err(DinfoxError::PayloadEmpty);
        }
        let payload = UplinkPayload::new(payload_type, header, &body[..size])?;
        info!(
            "[NODE] Encoded {:?} payload of {} {:?} ({} bytes).",
            payload_type,
            board.name(),
            node.address,
            payload.len()
        );
        Ok(payload)
    }
}
