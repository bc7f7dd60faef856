// crates/dinfox-rs/src/uplink/mod.rs
pub mod bits;
pub mod payload;
pub mod scheduler;

pub use bits::{BitReader, BitWriter};
pub use payload::{
    PayloadType, STARTUP_PAYLOAD_SIZE, StartupPayload, UPLINK_BODY_SIZE_MAX, UPLINK_HEADER_SIZE,
    UPLINK_PAYLOAD_SIZE_MAX, UplinkHeader, UplinkPayload,
};
pub use scheduler::{TaskOutcome, UplinkContext, UplinkScheduler};
