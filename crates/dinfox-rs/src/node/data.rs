// crates/dinfox-rs/src/node/data.rs
//! String data and register value caches of the node being refreshed.

use super::registers::{REGISTER_ADDRESS_MAX, STRING_DATA_ERROR, STRING_DATA_INDEX_MAX};
use crate::hal::DinfoxError;
use core::fmt;
use heapless::String;

/// Capacity of a slot name or value.
pub const STRING_BUFFER_SIZE: usize = 32;

/// Human-readable projection of one or more registers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringDataSlot {
    pub name: String<STRING_BUFFER_SIZE>,
    pub value: String<STRING_BUFFER_SIZE>,
    /// Present only when every underlying read succeeded.
    pub unit: Option<&'static str>,
}

impl StringDataSlot {
    pub fn is_error(&self) -> bool {
        self.value.ends_with(STRING_DATA_ERROR)
    }
}

impl fmt::Display for StringDataSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}{}", self.name, self.value, self.unit.unwrap_or(""))
    }
}

/// Caches filled by a string data refresh and read by the uplink encoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    slots: [StringDataSlot; STRING_DATA_INDEX_MAX],
    registers: [i32; REGISTER_ADDRESS_MAX],
}

impl Default for NodeData {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeData {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| StringDataSlot::default()),
            registers: [0; REGISTER_ADDRESS_MAX],
        }
    }

    /// Clears every slot and register value.
    pub fn flush(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = StringDataSlot::default());
        self.registers = [0; REGISTER_ADDRESS_MAX];
    }

    pub fn slot(&self, index: u8) -> Result<&StringDataSlot, DinfoxError> {
        self.slots.get(index as usize).ok_or(DinfoxError::InvalidAddress)
    }

    fn slot_mut(&mut self, index: u8) -> Result<&mut StringDataSlot, DinfoxError> {
        self.slots.get_mut(index as usize).ok_or(DinfoxError::InvalidAddress)
    }

    /// Clears one slot and sets its name.
    pub fn start_slot(&mut self, index: u8, name: &str) -> Result<(), DinfoxError> {
        let slot = self.slot_mut(index)?;
        *slot = StringDataSlot::default();
        slot.name.push_str(name).map_err(|_| DinfoxError::BufferOverflow)
    }

    pub fn append_value(&mut self, index: u8, text: &str) -> Result<(), DinfoxError> {
        self.slot_mut(index)?
            .value
            .push_str(text)
            .map_err(|_| DinfoxError::BufferOverflow)
    }

    pub fn append_error(&mut self, index: u8) -> Result<(), DinfoxError> {
        self.append_value(index, STRING_DATA_ERROR)
    }

    pub fn set_unit(&mut self, index: u8, unit: Option<&'static str>) -> Result<(), DinfoxError> {
        self.slot_mut(index)?.unit = unit;
        Ok(())
    }

    pub fn set_register(&mut self, register_address: u8, value: i32) -> Result<(), DinfoxError> {
        let cell = self
            .registers
            .get_mut(register_address as usize)
            .ok_or(DinfoxError::InvalidAddress)?;
        *cell = value;
        Ok(())
    }

    /// Cached register value, 0 if never read.
    pub fn register(&self, register_address: u8) -> i32 {
        self.registers.get(register_address as usize).copied().unwrap_or(0)
    }

    pub fn registers(&self) -> &[i32] {
        &self.registers
    }
}
