// crates/dinfox-rs/src/node/common.rs
//! String data slots shared by every board of the common protocol.

use super::board::RegisterAccess;
use super::data::NodeData;
use super::registers::*;
use crate::hal::DinfoxError;
use crate::uplink::BitWriter;

/// Reads one register and, on success, caches its value and appends
/// `prefix` followed by its text to the slot. On failure appends `ERROR`.
///
/// Returns whether the read succeeded.
fn append_register(
    index: u8,
    register_address: u8,
    prefix: &str,
    access: &mut dyn RegisterAccess,
    data: &mut NodeData,
) -> Result<bool, DinfoxError> {
    let format = common_register_format(register_address).ok_or(DinfoxError::InvalidAddress)?;
    let read = access.read_register(register_address, format)?;
    if read.is_success() {
        data.append_value(index, prefix)?;
        data.append_value(index, &read.text)?;
        data.set_register(register_address, read.value)?;
        Ok(true)
    } else {
        data.append_error(index)?;
        Ok(false)
    }
}

/// Reads every register in sequence, separated by `.`, stopping at the
/// first failed access.
fn append_dotted(
    index: u8,
    registers: &[u8],
    access: &mut dyn RegisterAccess,
    data: &mut NodeData,
) -> Result<bool, DinfoxError> {
    for (position, register_address) in registers.iter().enumerate() {
        let prefix = if position == 0 { "" } else { "." };
        if !append_register(index, *register_address, prefix, access, data)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Refreshes a common string data slot (`index < COMMON_STRING_DATA_LAST`).
///
/// Versions are assembled sub-field by sub-field and keep what was read
/// before a failure. The unit is appended only when every read succeeded.
pub fn update_common_data(index: u8, access: &mut dyn RegisterAccess, data: &mut NodeData) -> Result<(), DinfoxError> {
    let name = COMMON_STRING_DATA_NAME
        .get(index as usize)
        .ok_or(DinfoxError::InvalidAddress)?;
    data.start_slot(index, name)?;
    let complete = match index {
        STRING_DATA_INDEX_HW_VERSION => append_dotted(
            index,
            &[REGISTER_HW_VERSION_MAJOR, REGISTER_HW_VERSION_MINOR],
            access,
            data,
        )?,
        STRING_DATA_INDEX_SW_VERSION => {
            append_dotted(
                index,
                &[
                    REGISTER_SW_VERSION_MAJOR,
                    REGISTER_SW_VERSION_MINOR,
                    REGISTER_SW_VERSION_COMMIT_INDEX,
                ],
                access,
                data,
            )? && append_version_suffix(index, access, data)?
        }
        STRING_DATA_INDEX_RESET_FLAGS => append_register(index, REGISTER_RESET_REASON, "0x", access, data)?,
        STRING_DATA_INDEX_TMCU_DEGREES => append_register(index, REGISTER_TMCU_DEGREES, "", access, data)?,
        STRING_DATA_INDEX_VMCU_MV => append_register(index, REGISTER_VMCU_MV, "", access, data)?,
        _ => return Err(DinfoxError::InvalidAddress),
    };
    if complete {
        data.set_unit(index, COMMON_STRING_DATA_UNIT[index as usize])?;
    }
    Ok(())
}

/// Commit id only feeds the register cache; a set dirty flag adds `.d`.
fn append_version_suffix(index: u8, access: &mut dyn RegisterAccess, data: &mut NodeData) -> Result<bool, DinfoxError> {
    let commit_id = access.read_register(
        REGISTER_SW_VERSION_COMMIT_ID,
        COMMON_REGISTER_FORMAT[REGISTER_SW_VERSION_COMMIT_ID as usize],
    )?;
    let commit_id_value = if commit_id.is_success() { commit_id.value } else { 0 };
    data.set_register(REGISTER_SW_VERSION_COMMIT_ID, commit_id_value)?;

    let dirty = access.read_register(
        REGISTER_SW_VERSION_DIRTY_FLAG,
        COMMON_REGISTER_FORMAT[REGISTER_SW_VERSION_DIRTY_FLAG as usize],
    )?;
    if !dirty.is_success() {
        data.append_error(index)?;
        return Ok(false);
    }
    data.set_register(REGISTER_SW_VERSION_DIRTY_FLAG, dirty.value)?;
    if dirty.value != 0 {
        data.append_value(index, ".d")?;
    }
    Ok(true)
}

/// Monitoring record shared by boards reporting MCU health only:
/// MCU voltage 16 bits (mV), MCU temperature 8 bits (degrees).
pub fn encode_mcu_monitoring(data: &NodeData, writer: &mut BitWriter<'_>) -> Result<(), DinfoxError> {
    writer.write(data.register(REGISTER_VMCU_MV) as u32, 16)?;
    writer.write(data.register(REGISTER_TMCU_DEGREES) as u32, 8)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::{AccessStatus, ValueFormat};
    use crate::node::board::RegisterRead;
    use alloc::vec::Vec;
    use core::fmt::Write;

    /// Register file answering reads from a table; missing registers time out.
    pub(crate) struct TableAccess {
        pub registers: Vec<(u8, i32)>,
        pub reads: Vec<u8>,
    }

    impl TableAccess {
        pub(crate) fn new(registers: &[(u8, i32)]) -> Self {
            Self {
                registers: registers.to_vec(),
                reads: Vec::new(),
            }
        }
    }

    impl RegisterAccess for TableAccess {
        fn read_register(&mut self, register_address: u8, format: ValueFormat) -> Result<RegisterRead, DinfoxError> {
            self.reads.push(register_address);
            let mut read = RegisterRead::default();
            match self.registers.iter().find(|(address, _)| *address == register_address) {
                Some((_, value)) => {
                    read.value = *value;
                    crate::bus::write_value(&mut read.text, *value, format).map_err(DinfoxError::from)?;
                }
                None => read.status = AccessStatus::ReplyTimeout,
            }
            Ok(read)
        }
    }

    fn slot_text(data: &NodeData, index: u8) -> heapless::String<80> {
        let mut text = heapless::String::new();
        write!(text, "{}", data.slot(index).unwrap()).unwrap();
        text
    }

    #[test]
    fn test_software_version_with_dirty_flag() {
        let mut access = TableAccess::new(&[
            (REGISTER_SW_VERSION_MAJOR, 1),
            (REGISTER_SW_VERSION_MINOR, 4),
            (REGISTER_SW_VERSION_COMMIT_INDEX, 7),
            (REGISTER_SW_VERSION_COMMIT_ID, 0xABCDEF1),
            (REGISTER_SW_VERSION_DIRTY_FLAG, 1),
        ]);
        let mut data = NodeData::new();
        update_common_data(STRING_DATA_INDEX_SW_VERSION, &mut access, &mut data).unwrap();
        assert_eq!(slot_text(&data, 1).as_str(), "SW = 1.4.7.d");
        assert_eq!(data.register(REGISTER_SW_VERSION_COMMIT_ID), 0xABCDEF1);
        assert_eq!(data.register(REGISTER_SW_VERSION_DIRTY_FLAG), 1);
    }

    #[test]
    fn test_version_assembly_stops_at_first_error() {
        let mut access = TableAccess::new(&[(REGISTER_SW_VERSION_MAJOR, 2)]);
        let mut data = NodeData::new();
        update_common_data(STRING_DATA_INDEX_SW_VERSION, &mut access, &mut data).unwrap();
        let slot = data.slot(STRING_DATA_INDEX_SW_VERSION).unwrap();
        assert_eq!(slot.value.as_str(), "2ERROR");
        assert!(slot.is_error());
        assert_eq!(slot.unit, None);
        assert_eq!(access.reads, [REGISTER_SW_VERSION_MAJOR, REGISTER_SW_VERSION_MINOR]);
    }

    #[test]
    fn test_units_and_prefixes() {
        let mut access = TableAccess::new(&[
            (REGISTER_RESET_REASON, 0x24),
            (REGISTER_TMCU_DEGREES, 21),
            (REGISTER_VMCU_MV, 3300),
            (REGISTER_HW_VERSION_MAJOR, 1),
            (REGISTER_HW_VERSION_MINOR, 0),
        ]);
        let mut data = NodeData::new();
        for index in 0..COMMON_STRING_DATA_LAST {
            if index != STRING_DATA_INDEX_SW_VERSION {
                update_common_data(index, &mut access, &mut data).unwrap();
            }
        }
        assert_eq!(slot_text(&data, STRING_DATA_INDEX_HW_VERSION).as_str(), "HW = 1.0");
        assert_eq!(slot_text(&data, STRING_DATA_INDEX_RESET_FLAGS).as_str(), "RESET = 0x24");
        assert_eq!(slot_text(&data, STRING_DATA_INDEX_TMCU_DEGREES).as_str(), "TMCU = 21|C");
        assert_eq!(slot_text(&data, STRING_DATA_INDEX_VMCU_MV).as_str(), "VMCU = 3300mV");
        assert_eq!(data.register(REGISTER_VMCU_MV), 3300);
        assert_eq!(
            update_common_data(COMMON_STRING_DATA_LAST, &mut access, &mut data),
            Err(DinfoxError::InvalidAddress)
        );
    }
}
