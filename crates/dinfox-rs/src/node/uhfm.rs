// crates/dinfox-rs/src/node/uhfm.rs
//! UHFM: radio gateway board. Exposes the common data only.

use super::board::Board;
use super::common::encode_mcu_monitoring;
use super::data::NodeData;
use super::registers::{COMMON_REGISTER_LAST, COMMON_STRING_DATA_LAST};
use crate::hal::DinfoxError;
use crate::uplink::{BitWriter, PayloadType};

pub struct Uhfm;

pub static UHFM: Uhfm = Uhfm;

impl Board for Uhfm {
    fn name(&self) -> &'static str {
        "UHFM"
    }

    fn last_register_address(&self) -> u8 {
        COMMON_REGISTER_LAST
    }

    fn last_string_data_index(&self) -> u8 {
        COMMON_STRING_DATA_LAST
    }

    fn encode_payload(
        &self,
        payload_type: PayloadType,
        data: &NodeData,
        writer: &mut BitWriter<'_>,
    ) -> Result<(), DinfoxError> {
        match payload_type {
            PayloadType::Monitoring => encode_mcu_monitoring(data, writer),
            // No data record: nothing is written.
            PayloadType::Data => Ok(()),
            PayloadType::Startup => Err(DinfoxError::NotSupported),
        }
    }
}
