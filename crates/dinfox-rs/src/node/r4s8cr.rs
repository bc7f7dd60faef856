// crates/dinfox-rs/src/node/r4s8cr.rs
//! R4S8CR: 8-channel relay board on the relay protocol.
//!
//! `ST` answers one line of 8 `0`/`1` characters, relay 1 first.
//! `R<n>=<0|1>` drives relay `n` (1-based) and answers `OK`.

use super::board::{Board, Protocol, RegisterAccess, RegisterRead};
use super::data::NodeData;
use crate::bus::{AccessStatus, BusEngine, RawControl, ReplyRequest, ValueFormat, write_value};
use crate::config::AddressingMode;
use crate::hal::{BusTransport, Clock, DinfoxError};
use crate::types::NodeAddress;
use crate::uplink::{BitWriter, PayloadType};
use log::{debug, trace};

pub const RELAY_COUNT: u8 = 8;
pub const REGISTER_LAST: u8 = RELAY_COUNT;
pub const STRING_DATA_INDEX_LAST: u8 = RELAY_COUNT;

pub const COMMAND_READ_STATUS: &str = "ST";

const STRING_DATA_NAME: [&str; RELAY_COUNT as usize] =
    ["R1 =", "R2 =", "R3 =", "R4 =", "R5 =", "R6 =", "R7 =", "R8 ="];

/// Relay states of a status line, relay 1 first.
fn parse_status(line: &[u8]) -> Option<[bool; RELAY_COUNT as usize]> {
    if line.len() != RELAY_COUNT as usize {
        return None;
    }
    let mut states = [false; RELAY_COUNT as usize];
    for (state, byte) in states.iter_mut().zip(line) {
        *state = match byte {
            b'0' => false,
            b'1' => true,
            _ => return None,
        };
    }
    Some(states)
}

fn require_multi_address<T: BusTransport, C: Clock>(engine: &BusEngine<'_, T, C>) -> Result<(), DinfoxError> {
    match engine.mode() {
        AddressingMode::MultiAddress => Ok(()),
        AddressingMode::SingleNode => Err(DinfoxError::ProtocolMismatch),
    }
}

/// Sends `ST` and waits for a valid status line.
fn read_status<T: BusTransport, C: Clock>(
    engine: &mut BusEngine<'_, T, C>,
    address: NodeAddress,
) -> Result<(AccessStatus, Option<[bool; RELAY_COUNT as usize]>), DinfoxError> {
    require_multi_address(engine)?;
    engine.send_command(Some(address), COMMAND_READ_STATUS)?;
    let reply_timeout_ms = engine.config().reply_timeout_ms;
    let mut states = None;
    let reply = engine.wait_raw_reply(reply_timeout_ms, |line| match parse_status(line) {
        Some(parsed) => {
            states = Some(parsed);
            RawControl::Stop
        }
        None => RawControl::Continue,
    })?;
    let status = match (reply.status, states) {
        (AccessStatus::Success, None) => AccessStatus::ParseError,
        (status, _) => status,
    };
    trace!("[NODE] Relay board {} status {:?}.", address, status);
    Ok((status, states))
}

/// Whether a relay board answers at `address`.
pub fn probe<T: BusTransport, C: Clock>(
    engine: &mut BusEngine<'_, T, C>,
    address: NodeAddress,
) -> Result<bool, DinfoxError> {
    let (status, _) = read_status(engine, address)?;
    Ok(status.is_success())
}

/// Reads the state of relay `register_address + 1`.
pub fn read_register<T: BusTransport, C: Clock>(
    engine: &mut BusEngine<'_, T, C>,
    address: NodeAddress,
    register_address: u8,
) -> Result<RegisterRead, DinfoxError> {
    if register_address >= REGISTER_LAST {
        return Err(DinfoxError::InvalidAddress);
    }
    let (status, states) = read_status(engine, address)?;
    let mut read = RegisterRead {
        status,
        ..RegisterRead::default()
    };
    if let Some(states) = states {
        read.value = states[register_address as usize] as i32;
        write_value(&mut read.text, read.value, ValueFormat::Boolean)?;
    }
    Ok(read)
}

/// Drives relay `register_address + 1`; any non-zero value closes it.
pub fn write_register<T: BusTransport, C: Clock>(
    engine: &mut BusEngine<'_, T, C>,
    address: NodeAddress,
    register_address: u8,
    value: i32,
) -> Result<AccessStatus, DinfoxError> {
    if register_address >= REGISTER_LAST {
        return Err(DinfoxError::InvalidAddress);
    }
    require_multi_address(engine)?;
    let command = crate::bus::command::custom(format_args!(
        "R{}={}",
        register_address + 1,
        (value != 0) as u8
    ))?;
    engine.send_command(Some(address), &command)?;
    let reply = engine.wait_reply(ReplyRequest::ok(engine.config().reply_timeout_ms))?;
    debug!("[NODE] Relay {} of {} set to {}: {:?}.", register_address + 1, address, value != 0, reply.status);
    Ok(reply.status)
}

pub struct R4s8cr;

pub static R4S8CR: R4s8cr = R4s8cr;

impl Board for R4s8cr {
    fn name(&self) -> &'static str {
        "R4S8CR"
    }

    fn protocol(&self) -> Protocol {
        Protocol::Relay
    }

    fn last_register_address(&self) -> u8 {
        REGISTER_LAST
    }

    fn last_string_data_index(&self) -> u8 {
        STRING_DATA_INDEX_LAST
    }

    fn register_format(&self, register_address: u8) -> Option<ValueFormat> {
        (register_address < REGISTER_LAST).then_some(ValueFormat::Boolean)
    }

    fn update_specific_data(
        &self,
        string_data_index: u8,
        access: &mut dyn RegisterAccess,
        data: &mut NodeData,
    ) -> Result<(), DinfoxError> {
        let name = STRING_DATA_NAME
            .get(string_data_index as usize)
            .ok_or(DinfoxError::InvalidAddress)?;
        data.start_slot(string_data_index, name)?;
        let read = access.read_register(string_data_index, ValueFormat::Boolean)?;
        if !read.is_success() {
            return data.append_error(string_data_index);
        }
        data.set_register(string_data_index, read.value)?;
        data.append_value(string_data_index, if read.value == 0 { "OFF" } else { "ON" })
    }

    fn encode_payload(
        &self,
        payload_type: PayloadType,
        data: &NodeData,
        writer: &mut BitWriter<'_>,
    ) -> Result<(), DinfoxError> {
        match payload_type {
            PayloadType::Data => {
                for register_address in 0..REGISTER_LAST {
                    writer.write_bool(data.register(register_address) != 0)?;
                }
                Ok(())
            }
            PayloadType::Monitoring => Ok(()),
            PayloadType::Startup => Err(DinfoxError::NotSupported),
        }
    }
}
