// crates/dinfox-rs/src/node/registers.rs
//! Register map and string data slots shared by every board of the common protocol.

use crate::bus::ValueFormat;

pub const REGISTER_NODE_ADDRESS: u8 = 0x00;
pub const REGISTER_BOARD_ID: u8 = 0x01;
pub const REGISTER_HW_VERSION_MAJOR: u8 = 0x02;
pub const REGISTER_HW_VERSION_MINOR: u8 = 0x03;
pub const REGISTER_SW_VERSION_MAJOR: u8 = 0x04;
pub const REGISTER_SW_VERSION_MINOR: u8 = 0x05;
pub const REGISTER_SW_VERSION_COMMIT_INDEX: u8 = 0x06;
pub const REGISTER_SW_VERSION_COMMIT_ID: u8 = 0x07;
pub const REGISTER_SW_VERSION_DIRTY_FLAG: u8 = 0x08;
pub const REGISTER_RESET_REASON: u8 = 0x09;
pub const REGISTER_TMCU_DEGREES: u8 = 0x0A;
pub const REGISTER_VMCU_MV: u8 = 0x0B;
/// First board-specific register address.
pub const COMMON_REGISTER_LAST: u8 = 0x0C;

pub const COMMON_REGISTER_FORMAT: [ValueFormat; COMMON_REGISTER_LAST as usize] = [
    ValueFormat::Hexadecimal,
    ValueFormat::Hexadecimal,
    ValueFormat::Decimal,
    ValueFormat::Decimal,
    ValueFormat::Decimal,
    ValueFormat::Decimal,
    ValueFormat::Decimal,
    ValueFormat::Hexadecimal,
    ValueFormat::Boolean,
    ValueFormat::Hexadecimal,
    ValueFormat::Decimal,
    ValueFormat::Decimal,
];

pub const STRING_DATA_INDEX_HW_VERSION: u8 = 0;
pub const STRING_DATA_INDEX_SW_VERSION: u8 = 1;
pub const STRING_DATA_INDEX_RESET_FLAGS: u8 = 2;
pub const STRING_DATA_INDEX_TMCU_DEGREES: u8 = 3;
pub const STRING_DATA_INDEX_VMCU_MV: u8 = 4;
/// First board-specific string data index.
pub const COMMON_STRING_DATA_LAST: u8 = 5;

pub const COMMON_STRING_DATA_NAME: [&str; COMMON_STRING_DATA_LAST as usize] =
    ["HW =", "SW =", "RESET =", "TMCU =", "VMCU ="];
pub const COMMON_STRING_DATA_UNIT: [Option<&str>; COMMON_STRING_DATA_LAST as usize] =
    [None, None, None, Some("|C"), Some("mV")];

/// Size of the string data and register caches.
pub const STRING_DATA_INDEX_MAX: usize = 32;
pub const REGISTER_ADDRESS_MAX: usize = 64;

/// Value column of a slot whose register access failed.
pub const STRING_DATA_ERROR: &str = "ERROR";

/// Format of a register below [`COMMON_REGISTER_LAST`].
pub fn common_register_format(register_address: u8) -> Option<ValueFormat> {
    COMMON_REGISTER_FORMAT.get(register_address as usize).copied()
}

/// Register backing a board-specific string data slot of the common protocol.
pub fn specific_register_address(string_data_index: u8) -> u8 {
    string_data_index + COMMON_REGISTER_LAST - COMMON_STRING_DATA_LAST
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_slot_maps_to_first_specific_register() {
        assert_eq!(specific_register_address(COMMON_STRING_DATA_LAST), COMMON_REGISTER_LAST);
        assert_eq!(specific_register_address(8), 0x0F);
    }

    #[test]
    fn test_common_formats() {
        assert_eq!(common_register_format(REGISTER_BOARD_ID), Some(ValueFormat::Hexadecimal));
        assert_eq!(common_register_format(REGISTER_SW_VERSION_DIRTY_FLAG), Some(ValueFormat::Boolean));
        assert_eq!(common_register_format(REGISTER_VMCU_MV), Some(ValueFormat::Decimal));
        assert_eq!(common_register_format(COMMON_REGISTER_LAST), None);
    }
}
