// crates/dinfox-rs/src/node/lvrm.rs
//! LVRM: low-voltage relay module.

use super::board::{Board, RegisterAccess};
use super::common::encode_mcu_monitoring;
use super::data::NodeData;
use super::registers::{COMMON_REGISTER_LAST, COMMON_STRING_DATA_LAST, specific_register_address};
use crate::bus::ValueFormat;
use crate::hal::DinfoxError;
use crate::uplink::{BitWriter, PayloadType};

pub const REGISTER_VCOM_MV: u8 = COMMON_REGISTER_LAST;
pub const REGISTER_VOUT_MV: u8 = COMMON_REGISTER_LAST + 1;
pub const REGISTER_IOUT_UA: u8 = COMMON_REGISTER_LAST + 2;
pub const REGISTER_OUT_EN: u8 = COMMON_REGISTER_LAST + 3;
pub const REGISTER_LAST: u8 = COMMON_REGISTER_LAST + 4;

pub const STRING_DATA_INDEX_OUT_EN: u8 = COMMON_STRING_DATA_LAST + 3;
pub const STRING_DATA_INDEX_LAST: u8 = COMMON_STRING_DATA_LAST + 4;

const REGISTERS_FORMAT: [ValueFormat; 4] = [
    ValueFormat::Decimal,
    ValueFormat::Decimal,
    ValueFormat::Decimal,
    ValueFormat::Boolean,
];
const STRING_DATA_NAME: [&str; 4] = ["VCOM =", "VOUT =", "IOUT =", "RELAY ="];
const STRING_DATA_UNIT: [Option<&str>; 4] = [Some("mV"), Some("mV"), Some("uA"), None];

pub struct Lvrm;

pub static LVRM: Lvrm = Lvrm;

impl Board for Lvrm {
    fn name(&self) -> &'static str {
        "LVRM"
    }

    fn last_register_address(&self) -> u8 {
        REGISTER_LAST
    }

    fn last_string_data_index(&self) -> u8 {
        STRING_DATA_INDEX_LAST
    }

    fn register_format(&self, register_address: u8) -> Option<ValueFormat> {
        let offset = register_address.checked_sub(COMMON_REGISTER_LAST)?;
        REGISTERS_FORMAT.get(offset as usize).copied()
    }

    fn update_specific_data(
        &self,
        string_data_index: u8,
        access: &mut dyn RegisterAccess,
        data: &mut NodeData,
    ) -> Result<(), DinfoxError> {
        if !(COMMON_STRING_DATA_LAST..STRING_DATA_INDEX_LAST).contains(&string_data_index) {
            return Err(DinfoxError::InvalidAddress);
        }
        let slot = (string_data_index - COMMON_STRING_DATA_LAST) as usize;
        let register_address = specific_register_address(string_data_index);
        data.start_slot(string_data_index, STRING_DATA_NAME[slot])?;
        let read = access.read_register(register_address, REGISTERS_FORMAT[slot])?;
        if !read.is_success() {
            return data.append_error(string_data_index);
        }
        data.set_register(register_address, read.value)?;
        if string_data_index == STRING_DATA_INDEX_OUT_EN {
            data.append_value(string_data_index, if read.value == 0 { "OFF" } else { "ON" })?;
        } else {
            data.append_value(string_data_index, &read.text)?;
        }
        data.set_unit(string_data_index, STRING_DATA_UNIT[slot])
    }

    fn encode_payload(
        &self,
        payload_type: PayloadType,
        data: &NodeData,
        writer: &mut BitWriter<'_>,
    ) -> Result<(), DinfoxError> {
        match payload_type {
            PayloadType::Monitoring => encode_mcu_monitoring(data, writer),
            PayloadType::Data => {
                writer.write(data.register(REGISTER_VCOM_MV) as u32, 16)?;
                writer.write(data.register(REGISTER_VOUT_MV) as u32, 16)?;
                writer.write(data.register(REGISTER_IOUT_UA) as u32, 23)?;
                writer.write(data.register(REGISTER_OUT_EN) as u32, 1)
            }
            PayloadType::Startup => Err(DinfoxError::NotSupported),
        }
    }
}
