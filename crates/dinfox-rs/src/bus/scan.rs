// crates/dinfox-rs/src/bus/scan.rs
//! Node discovery.

use super::engine::BusEngine;
use super::parser::ValueFormat;
use crate::config::AddressingMode;
use crate::hal::{BusTransport, Clock, ConfigKey, ConfigStore, DinfoxError, Watchdog};
use crate::node::registers::REGISTER_BOARD_ID;
use crate::node::r4s8cr;
use crate::node::{Node, NodeTable};
use crate::types::{BoardId, NodeAddress};
use log::{debug, info, warn};

/// Outcome of a bus scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Master board first, then responders in discovery order.
    pub nodes: NodeTable,
    /// Responders found on the bus, including those that did not fit the table.
    pub responders: usize,
    /// Table index of the radio gateway board, if one was discovered.
    pub gateway: Option<usize>,
}

impl ScanResult {
    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }
}

fn record<T: BusTransport, C: Clock>(
    engine: &mut BusEngine<'_, T, C>,
    result: &mut ScanResult,
    address: Option<NodeAddress>,
) -> Result<(), DinfoxError> {
    result.responders += 1;
    let mut node = Node::new(address, BoardId::Unknown);
    // Presence does not require identity.
    let reply = engine.read_register(address, REGISTER_BOARD_ID, ValueFormat::Hexadecimal)?;
    if reply.status.is_success() {
        node.board_id = BoardId::from(reply.value as u8);
    } else {
        debug!("[SCAN] Node {:?} did not report its board id ({:?}).", address, reply.status);
    }
    info!("[SCAN] Found {:?} at {:?}.", node.board_id, address);
    if result.nodes.push(node).is_err() {
        warn!("[SCAN] Node table full, {:?} not stored.", address);
    }
    Ok(())
}

/// Scans the bus and rebuilds the node table.
///
/// The master board (address read from the configuration store) is node 0.
/// In multi-address mode every address of the scan range is pinged, then the
/// relay-board window is probed with the relay protocol.
pub fn scan_nodes<T, C, S, W>(
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
    let local = store
        .read_byte(ConfigKey::BusAddress)
        .map_err(|_| DinfoxError::ConfigStore)?;
    let local = NodeAddress::try_from(local)?;
    engine.set_local_address(local);

    let mut result = ScanResult {
        nodes: NodeTable::new(),
        responders: 0,
        gateway: None,
    };
    let config = engine.config().clone();
    let mode = config.mode;
    let master_address = match mode {
        AddressingMode::MultiAddress => Some(local),
        AddressingMode::SingleNode => None,
    };
    result.nodes.push(Node::new(master_address, BoardId::Dmm))?;

    match mode {
        AddressingMode::MultiAddress => {
            for address in config.scan_range() {
                if address != local {
                    let reply = engine.ping(Some(address))?;
                    if reply.status.is_success() {
                        record(engine, &mut result, Some(address))?;
                    }
                }
                watchdog.reload();
            }
            for address in config.relay_range() {
                if address != local && !result.nodes.contains_address(address) && r4s8cr::probe(engine, address)? {
                    result.responders += 1;
                    info!("[SCAN] Found relay board at {}.", address);
                    if result.nodes.push(Node::new(Some(address), BoardId::R4s8cr)).is_err() {
                        warn!("[SCAN] Node table full, {} not stored.", address);
                    }
                }
                watchdog.reload();
            }
        }
        AddressingMode::SingleNode => {
            let reply = engine.ping(None)?;
            if reply.status.is_success() {
                record(engine, &mut result, None)?;
            }
            watchdog.reload();
        }
    }

    result.gateway = result.nodes.find_board(BoardId::Uhfm).map(|(index, _)| index);
    info!(
        "[SCAN] Scan complete: {} responder(s), {} node(s) stored, gateway {:?}.",
        result.responders,
        result.nodes.len(),
        result.gateway
    );
    Ok(result)
}
