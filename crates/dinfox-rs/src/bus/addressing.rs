// crates/dinfox-rs/src/bus/addressing.rs
//! Framing strategies of the two bus variants.

use super::command::COMMAND_BUFFER_SIZE;
use super::reply::ReplyLine;
use crate::config::AddressingMode;
use crate::hal::DinfoxError;
use crate::types::{DESTINATION_ADDRESS_MARKER, FRAME_END, NodeAddress};
use heapless::Vec;

/// Outbound frame: optional address bytes, body and terminator.
pub type Frame = Vec<u8, { COMMAND_BUFFER_SIZE + 2 }>;

impl AddressingMode {
    /// Frames a command body for transmission.
    ///
    /// Multi-address frames are `[dest | 0x80, source, body..., '\r']`;
    /// single-node frames are `[body..., '\r']`.
    pub fn frame(
        &self,
        local: NodeAddress,
        destination: Option<NodeAddress>,
        body: &[u8],
    ) -> Result<Frame, DinfoxError> {
        if body.is_empty() {
            return Err(DinfoxError::NullInput);
        }
        // The body and its terminator must fit the command buffer.
        if body.len() + 1 > COMMAND_BUFFER_SIZE {
            return Err(DinfoxError::BufferOverflow);
        }
        let mut frame = Frame::new();
        if let AddressingMode::MultiAddress = self {
            let destination = destination.ok_or(DinfoxError::InvalidAddress)?;
            let destination = NodeAddress::try_from(destination.0)?;
            frame
                .push(destination.0 | DESTINATION_ADDRESS_MARKER)
                .map_err(|_| DinfoxError::BufferOverflow)?;
            frame.push(local.0).map_err(|_| DinfoxError::BufferOverflow)?;
        }
        frame
            .extend_from_slice(body)
            .map_err(|_| DinfoxError::BufferOverflow)?;
        frame.push(FRAME_END).map_err(|_| DinfoxError::BufferOverflow)?;
        Ok(frame)
    }

    /// Returns the payload of a line sent by the expected responder, or
    /// `None` when the line comes from someone else.
    pub fn authenticate<'a, const LINE: usize>(
        &self,
        expected: Option<NodeAddress>,
        line: &'a ReplyLine<LINE>,
    ) -> Option<&'a [u8]> {
        match self {
            AddressingMode::SingleNode => Some(line.as_bytes()),
            AddressingMode::MultiAddress => {
                let expected = expected?;
                (line.source_address() == Some(expected.0)).then(|| line.addressed_payload())
            }
        }
    }
}
