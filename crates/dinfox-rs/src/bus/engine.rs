// crates/dinfox-rs/src/bus/engine.rs
use super::command::{self, REPLY_ERROR, REPLY_OK};
use super::parser::{ValueFormat, matches_command, matches_header, parse_value};
use super::reply::{ReplyLine, ReplyRing};
use crate::config::{AddressingMode, BusConfig};
use crate::hal::{BusTransport, Clock, DinfoxError};
use crate::types::NodeAddress;
use alloc::vec::Vec;
use log::{debug, trace, warn};

/// Expected shape of the reply to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Any line is accepted and captured; the wait only ends on timeout
    /// (or on `RawControl::Stop` from `wait_raw_reply`).
    Raw,
    /// The literal `OK`.
    Ok,
    /// A single value field in the requested format.
    Value,
}

/// Parameters of one reply wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyRequest {
    pub kind: ReplyKind,
    pub format: ValueFormat,
    pub reply_timeout_ms: u32,
}

impl ReplyRequest {
    pub fn ok(reply_timeout_ms: u32) -> Self {
        Self {
            kind: ReplyKind::Ok,
            format: ValueFormat::Boolean,
            reply_timeout_ms,
        }
    }

    pub fn value(format: ValueFormat, reply_timeout_ms: u32) -> Self {
        Self {
            kind: ReplyKind::Value,
            format,
            reply_timeout_ms,
        }
    }

    pub fn raw(reply_timeout_ms: u32) -> Self {
        Self {
            kind: ReplyKind::Raw,
            format: ValueFormat::Decimal,
            reply_timeout_ms,
        }
    }
}

/// Bus-level outcome of a register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessStatus {
    #[default]
    Success,
    /// The node answered with an `ERROR` line.
    ErrorReceived,
    /// Lines arrived but none had the expected shape.
    ParseError,
    /// Nothing arrived within the per-reply timeout.
    ReplyTimeout,
    /// The whole exchange exceeded the sequence timeout.
    SequenceTimeout,
}

impl AccessStatus {
    pub fn is_success(&self) -> bool {
        *self == AccessStatus::Success
    }

    /// Maps a failed access onto the error taxonomy.
    pub fn to_error(&self) -> Option<DinfoxError> {
        match self {
            AccessStatus::Success => None,
            AccessStatus::ErrorReceived | AccessStatus::ParseError => Some(DinfoxError::ParseError),
            AccessStatus::ReplyTimeout => Some(DinfoxError::ReplyTimeout),
            AccessStatus::SequenceTimeout => Some(DinfoxError::SequenceTimeout),
        }
    }
}

/// Decision of a raw-reply callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawControl {
    Continue,
    Stop,
}

/// Result of a reply wait.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Reply {
    pub status: AccessStatus,
    /// Parsed value (`Value` requests only).
    pub value: i32,
    /// Payload of the line that ended the wait, source address stripped.
    pub raw: Option<ReplyLine>,
    /// Every payload captured by a `Raw` request, oldest first.
    pub lines: Vec<ReplyLine>,
    /// Lines received from the expected responder.
    pub reply_count: u32,
    /// Lines from other responders, ignored.
    pub noise: u32,
}

impl Reply {
    /// Text of the terminating line, empty if none or not valid UTF-8.
    pub fn raw_text(&self) -> &str {
        self.raw
            .as_ref()
            .and_then(|line| core::str::from_utf8(line.as_bytes()).ok())
            .unwrap_or("")
    }
}

/// Command/reply engine of the RS485 bus master.
///
/// Owns the transport and the clock; shares the reply ring with the receive
/// path, which must feed it through [`ReplyRing::on_byte_received`].
pub struct BusEngine<'r, T: BusTransport, C: Clock> {
    transport: T,
    clock: C,
    ring: &'r ReplyRing,
    config: BusConfig,
    local_address: NodeAddress,
    expected_responder: Option<NodeAddress>,
}

impl<'r, T: BusTransport, C: Clock> BusEngine<'r, T, C> {
    pub fn new(transport: T, clock: C, ring: &'r ReplyRing, config: BusConfig, local_address: NodeAddress) -> Self {
        Self {
            transport,
            clock,
            ring,
            config,
            local_address,
            expected_responder: None,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn mode(&self) -> AddressingMode {
        self.config.mode
    }

    pub fn local_address(&self) -> NodeAddress {
        self.local_address
    }

    pub fn set_local_address(&mut self, address: NodeAddress) {
        self.local_address = address;
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Lines lost by the reply ring since start-up.
    pub fn dropped_lines(&self) -> u32 {
        self.ring.dropped_lines()
    }

    /// Frames and transmits a command body.
    ///
    /// Pending replies are discarded. The receiver is re-enabled whatever
    /// the transmit outcome.
    pub fn send_command(&mut self, address: Option<NodeAddress>, body: &str) -> Result<(), DinfoxError> {
        let frame = self.config.mode.frame(self.local_address, address, body.as_bytes())?;
        self.transport.disable_rx();
        self.ring.reset();
        if self.config.mode == AddressingMode::MultiAddress {
            self.expected_responder = address;
        }
        trace!("[BUS] Sending {:?} to {:?}", body, address);
        let sent = self.transport.send(&frame);
        self.transport.enable_rx();
        sent.map_err(|e| {
            warn!("[BUS] Transmit failed: {}", e);
            DinfoxError::TransportFailure
        })
    }

    /// Waits for the reply to the last command.
    pub fn wait_reply(&mut self, request: ReplyRequest) -> Result<Reply, DinfoxError> {
        self.wait(request, |_| RawControl::Continue)
    }

    /// Waits for raw lines, letting `on_line` end the wait successfully.
    pub fn wait_raw_reply<F>(&mut self, reply_timeout_ms: u32, on_line: F) -> Result<Reply, DinfoxError>
    where
        F: FnMut(&[u8]) -> RawControl,
    {
        self.wait(ReplyRequest::raw(reply_timeout_ms), on_line)
    }

    fn wait<F>(&mut self, request: ReplyRequest, mut on_line: F) -> Result<Reply, DinfoxError>
    where
        F: FnMut(&[u8]) -> RawControl,
    {
        let poll_interval_ms = self.config.poll_interval_ms.max(1);
        let mut reply = Reply::default();
        let mut reply_time_ms: u32 = 0;
        let mut sequence_time_ms: u32 = 0;
        loop {
            self.clock.delay_ms(poll_interval_ms)?;
            reply_time_ms = reply_time_ms.saturating_add(poll_interval_ms);
            sequence_time_ms = sequence_time_ms.saturating_add(poll_interval_ms);

            while let Some(line) = self.ring.take_next() {
                let Some(payload) = self.config.mode.authenticate(self.expected_responder, &line) else {
                    reply.noise += 1;
                    trace!("[BUS] Ignoring line from {:?}", line.source_address());
                    continue;
                };
                reply.reply_count += 1;
                reply_time_ms = 0;
                if line.is_overflowed() {
                    debug!("[BUS] Discarding overlong reply line.");
                    continue;
                }
                match request.kind {
                    ReplyKind::Raw => {
                        let captured = ReplyLine::from_bytes(payload);
                        let control = on_line(payload);
                        reply.lines.push(captured);
                        if control == RawControl::Stop {
                            reply.raw = reply.lines.last().cloned();
                            reply.status = AccessStatus::Success;
                            return Ok(reply);
                        }
                        continue;
                    }
                    ReplyKind::Ok => {
                        if matches_command(payload, REPLY_OK) {
                            reply.raw = Some(ReplyLine::from_bytes(payload));
                            reply.status = AccessStatus::Success;
                            return Ok(reply);
                        }
                    }
                    ReplyKind::Value => {
                        if let Ok(value) = parse_value(payload, request.format) {
                            reply.value = value;
                            reply.raw = Some(ReplyLine::from_bytes(payload));
                            reply.status = AccessStatus::Success;
                            return Ok(reply);
                        }
                    }
                }
                if matches_header(payload, REPLY_ERROR) {
                    reply.raw = Some(ReplyLine::from_bytes(payload));
                    reply.status = AccessStatus::ErrorReceived;
                    return Ok(reply);
                }
            }

            if sequence_time_ms > self.config.sequence_timeout_ms {
                debug!("[BUS] Sequence timeout after {} ms.", sequence_time_ms);
                reply.status = AccessStatus::SequenceTimeout;
                return Ok(reply);
            }
            if reply_time_ms > request.reply_timeout_ms {
                reply.status = if request.kind == ReplyKind::Raw && !reply.lines.is_empty() {
                    AccessStatus::Success
                } else if reply.reply_count == 0 {
                    AccessStatus::ReplyTimeout
                } else {
                    AccessStatus::ParseError
                };
                return Ok(reply);
            }
        }
    }

    /// Pings a node with the common protocol; success means it answered `OK`.
    pub fn ping(&mut self, address: Option<NodeAddress>) -> Result<Reply, DinfoxError> {
        let command = command::ping()?;
        self.send_command(address, &command)?;
        self.wait_reply(ReplyRequest::ok(self.config.reply_timeout_ms))
    }

    pub fn read_register(
        &mut self,
        address: Option<NodeAddress>,
        register_address: u8,
        format: ValueFormat,
    ) -> Result<Reply, DinfoxError> {
        let command = command::read_register(register_address)?;
        self.send_command(address, &command)?;
        self.wait_reply(ReplyRequest::value(format, self.config.reply_timeout_ms))
    }

    pub fn write_register(
        &mut self,
        address: Option<NodeAddress>,
        register_address: u8,
        value: i32,
        format: ValueFormat,
    ) -> Result<Reply, DinfoxError> {
        let command = command::write_register(register_address, value, format)?;
        self.send_command(address, &command)?;
        self.wait_reply(ReplyRequest::ok(self.config.reply_timeout_ms))
    }
}
