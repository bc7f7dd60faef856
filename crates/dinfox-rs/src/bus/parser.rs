// crates/dinfox-rs/src/bus/parser.rs
//! Text value fields of the bus protocol.

use crate::hal::DinfoxError;
use core::fmt::{self, Write};

/// On-wire representation of a register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    /// Signed decimal, e.g. `-12`.
    Decimal,
    /// Uppercase hexadecimal without prefix, even number of digits, e.g. `0A`.
    Hexadecimal,
    /// `0` or `1`.
    Boolean,
}

/// Parses one value field in the given format.
///
/// Sign prefixes other than `-` on decimals are rejected.
pub fn parse_value(field: &[u8], format: ValueFormat) -> Result<i32, DinfoxError> {
    let text = core::str::from_utf8(field).map_err(|_| DinfoxError::ParseError)?;
    if text.starts_with('+') {
        return Err(DinfoxError::ParseError);
    }
    match format {
        ValueFormat::Decimal => text.parse::<i32>().map_err(|_| DinfoxError::ParseError),
        // Hex fields carry the raw 32-bit register.
        ValueFormat::Hexadecimal => u32::from_str_radix(text, 16)
            .map(|value| value as i32)
            .map_err(|_| DinfoxError::ParseError),
        ValueFormat::Boolean => match text {
            "0" => Ok(0),
            "1" => Ok(1),
            _ => Err(DinfoxError::ParseError),
        },
    }
}

/// Appends `value` to `out` in the given format.
pub fn write_value<W: Write>(out: &mut W, value: i32, format: ValueFormat) -> fmt::Result {
    match format {
        ValueFormat::Decimal => write!(out, "{}", value),
        ValueFormat::Hexadecimal => {
            let raw = value as u32;
            let significant = (32 - raw.leading_zeros()).div_ceil(4).max(1) as usize;
            let width = significant + (significant % 2);
            write!(out, "{:0width$X}", raw, width = width)
        }
        ValueFormat::Boolean => out.write_str(if value != 0 { "1" } else { "0" }),
    }
}

/// Whole-field comparison against a literal reply.
pub fn matches_command(payload: &[u8], reference: &str) -> bool {
    payload == reference.as_bytes()
}

/// Prefix comparison against a literal reply header.
pub fn matches_header(payload: &[u8], reference: &str) -> bool {
    payload.starts_with(reference.as_bytes())
}
