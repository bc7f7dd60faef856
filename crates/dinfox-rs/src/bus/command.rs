// crates/dinfox-rs/src/bus/command.rs
//! Command bodies of the common text protocol.

use super::parser::{ValueFormat, write_value};
use crate::hal::DinfoxError;
use core::fmt::Write;
use heapless::String;

/// Size of the command buffer, terminator included.
pub const COMMAND_BUFFER_SIZE: usize = 80;

pub const COMMAND_PING: &str = "RS";
pub const COMMAND_READ_REGISTER: &str = "RS$R=";
pub const COMMAND_WRITE_REGISTER: &str = "RS$W=";
pub const COMMAND_SEPARATOR: &str = ",";

pub const REPLY_OK: &str = "OK";
pub const REPLY_ERROR: &str = "ERROR";

/// A command body, without framing nor terminator.
pub type Command = String<COMMAND_BUFFER_SIZE>;

fn push(command: &mut Command, text: &str) -> Result<(), DinfoxError> {
    command.push_str(text).map_err(|_| DinfoxError::BufferOverflow)
}

pub fn ping() -> Result<Command, DinfoxError> {
    let mut command = Command::new();
    push(&mut command, COMMAND_PING)?;
    Ok(command)
}

/// `RS$R=<addr>` with the register address in 2-digit hex.
pub fn read_register(register_address: u8) -> Result<Command, DinfoxError> {
    let mut command = Command::new();
    push(&mut command, COMMAND_READ_REGISTER)?;
    write_value(&mut command, register_address as i32, ValueFormat::Hexadecimal)?;
    Ok(command)
}

/// `RS$W=<addr>,<value>` with the value in the register's own format.
pub fn write_register(register_address: u8, value: i32, format: ValueFormat) -> Result<Command, DinfoxError> {
    let mut command = Command::new();
    push(&mut command, COMMAND_WRITE_REGISTER)?;
    write_value(&mut command, register_address as i32, ValueFormat::Hexadecimal)?;
    push(&mut command, COMMAND_SEPARATOR)?;
    write_value(&mut command, value, format)?;
    Ok(command)
}

/// Builds an arbitrary command body from format arguments.
pub fn custom(args: core::fmt::Arguments<'_>) -> Result<Command, DinfoxError> {
    let mut command = Command::new();
    command.write_fmt(args)?;
    Ok(command)
}
