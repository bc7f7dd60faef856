// crates/dinfox-rs/tests/simulator/mod.rs
#![allow(dead_code)]

pub mod interface;

pub use interface::{SimulatedClock, SimulatedTransport};

use dinfox_rs::bus::{ValueFormat, parse_value, write_value};
use dinfox_rs::hal::{ConfigKey, ConfigStore, DinfoxError, Radio, UplinkStatus, Watchdog};
use dinfox_rs::node::registers::*;
use dinfox_rs::{BoardId, BusConfig, BusEngine, ReplyRing};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A line scheduled for delivery to the master's receiver.
#[derive(Debug, Clone)]
pub struct PendingLine {
    pub deliver_at_ms: u64,
    pub bytes: Vec<u8>,
}

/// Behaviour of a simulated board.
#[derive(Debug, Clone)]
pub enum Responder {
    /// Common text protocol with a register file.
    Common {
        registers: BTreeMap<u8, (i32, ValueFormat)>,
    },
    /// Relay protocol, relay 1 first.
    Relay { relays: [bool; 8] },
}

/// A board attached to the virtual bus.
#[derive(Debug, Clone)]
pub struct SimulatedNode {
    pub address: u8,
    pub latency_ms: u64,
    pub responder: Responder,
}

impl SimulatedNode {
    /// Common-protocol board with its board id and MCU registers.
    pub fn common(address: u8, board_id: BoardId) -> Self {
        let mut registers = BTreeMap::new();
        registers.insert(REGISTER_NODE_ADDRESS, (address as i32, ValueFormat::Hexadecimal));
        registers.insert(REGISTER_BOARD_ID, (u8::from(board_id) as i32, ValueFormat::Hexadecimal));
        registers.insert(REGISTER_HW_VERSION_MAJOR, (1, ValueFormat::Decimal));
        registers.insert(REGISTER_HW_VERSION_MINOR, (0, ValueFormat::Decimal));
        registers.insert(REGISTER_SW_VERSION_MAJOR, (1, ValueFormat::Decimal));
        registers.insert(REGISTER_SW_VERSION_MINOR, (4, ValueFormat::Decimal));
        registers.insert(REGISTER_SW_VERSION_COMMIT_INDEX, (7, ValueFormat::Decimal));
        registers.insert(REGISTER_SW_VERSION_COMMIT_ID, (0xABCDEF1, ValueFormat::Hexadecimal));
        registers.insert(REGISTER_SW_VERSION_DIRTY_FLAG, (1, ValueFormat::Boolean));
        registers.insert(REGISTER_RESET_REASON, (0x02, ValueFormat::Hexadecimal));
        registers.insert(REGISTER_TMCU_DEGREES, (21, ValueFormat::Decimal));
        registers.insert(REGISTER_VMCU_MV, (3300, ValueFormat::Decimal));
        Self {
            address,
            latency_ms: 5,
            responder: Responder::Common { registers },
        }
    }

    /// Board answering pings but without a board-id register.
    pub fn anonymous(address: u8) -> Self {
        Self {
            address,
            latency_ms: 5,
            responder: Responder::Common {
                registers: BTreeMap::new(),
            },
        }
    }

    pub fn relay(address: u8) -> Self {
        Self {
            address,
            latency_ms: 5,
            responder: Responder::Relay { relays: [false; 8] },
        }
    }

    pub fn with_register(mut self, register_address: u8, value: i32, format: ValueFormat) -> Self {
        if let Responder::Common { registers } = &mut self.responder {
            registers.insert(register_address, (value, format));
        }
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn register(&self, register_address: u8) -> Option<i32> {
        match &self.responder {
            Responder::Common { registers } => registers.get(&register_address).map(|(value, _)| *value),
            Responder::Relay { relays } => relays.get(register_address as usize).map(|on| *on as i32),
        }
    }

    /// Reply lines (payload only) to a command body.
    fn respond(&mut self, body: &str) -> Vec<String> {
        match &mut self.responder {
            Responder::Common { registers } => {
                if body == "RS" {
                    return vec!["OK".into()];
                }
                if let Some(address) = body.strip_prefix("RS$R=") {
                    let Ok(address) = u8::from_str_radix(address, 16) else {
                        return vec!["ERROR_CMD".into()];
                    };
                    return match registers.get(&address) {
                        Some((value, format)) => {
                            let mut text = String::new();
                            write_value(&mut text, *value, *format).unwrap();
                            vec![text]
                        }
                        None => vec!["ERROR_ADDR".into()],
                    };
                }
                if let Some(arguments) = body.strip_prefix("RS$W=") {
                    let Some((address, value)) = arguments.split_once(',') else {
                        return vec!["ERROR_CMD".into()];
                    };
                    let Ok(address) = u8::from_str_radix(address, 16) else {
                        return vec!["ERROR_CMD".into()];
                    };
                    let format = registers
                        .get(&address)
                        .map(|(_, format)| *format)
                        .unwrap_or(ValueFormat::Decimal);
                    return match parse_value(value.as_bytes(), format) {
                        Ok(value) => {
                            registers.insert(address, (value, format));
                            vec!["OK".into()]
                        }
                        Err(_) => vec!["ERROR_VALUE".into()],
                    };
                }
                vec!["ERROR_CMD".into()]
            }
            Responder::Relay { relays } => {
                if body == "ST" {
                    return vec![relays.iter().map(|on| if *on { '1' } else { '0' }).collect()];
                }
                let parsed = body
                    .strip_prefix('R')
                    .and_then(|rest| rest.split_once('='))
                    .and_then(|(relay, state)| Some((relay.parse::<usize>().ok()?, state)));
                match parsed {
                    Some((relay @ 1..=8, "0" | "1")) => {
                        relays[relay - 1] = body.ends_with('1');
                        vec!["OK".into()]
                    }
                    _ => vec![],
                }
            }
        }
    }
}

/// A virtual RS485 bus with simulated time.
///
/// Frames sent by the master are decoded and answered by the attached nodes;
/// their reply lines are delivered when the master's clock reaches them.
pub struct VirtualBus {
    pub multi_address: bool,
    current_time_ms: u64,
    pub nodes: Vec<SimulatedNode>,
    pending: Vec<PendingLine>,
    /// Every frame sent by the master (for assertions).
    pub frame_history: Vec<Vec<u8>>,
}

impl VirtualBus {
    pub fn new(multi_address: bool) -> Self {
        Self {
            multi_address,
            current_time_ms: 0,
            nodes: Vec::new(),
            pending: Vec::new(),
            frame_history: Vec::new(),
        }
    }

    pub fn shared(multi_address: bool) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(multi_address)))
    }

    pub fn attach(&mut self, node: SimulatedNode) {
        self.nodes.push(node);
    }

    pub fn node(&self, address: u8) -> Option<&SimulatedNode> {
        self.nodes.iter().find(|node| node.address == address)
    }

    pub fn current_time(&self) -> u64 {
        self.current_time_ms
    }

    /// Schedules raw bytes on the receive line, relative to now.
    pub fn inject(&mut self, delay_ms: u64, bytes: &[u8]) {
        self.pending.push(PendingLine {
            deliver_at_ms: self.current_time_ms + delay_ms,
            bytes: bytes.to_vec(),
        });
    }

    /// Decodes a frame from the master and queues the replies.
    pub fn transmit(&mut self, frame: &[u8]) {
        self.frame_history.push(frame.to_vec());
        let Some((&b'\r', content)) = frame.split_last() else {
            return;
        };
        let (destination, body) = if self.multi_address {
            match content {
                [destination, _source, body @ ..] => (Some(destination & 0x7F), body),
                _ => return,
            }
        } else {
            (None, content)
        };
        let Ok(body) = std::str::from_utf8(body) else {
            return;
        };
        let now = self.current_time_ms;
        let multi_address = self.multi_address;
        let mut replies = Vec::new();
        for node in self
            .nodes
            .iter_mut()
            .filter(|node| destination.is_none_or(|destination| destination == node.address))
        {
            for line in node.respond(body) {
                let mut bytes = Vec::new();
                if multi_address {
                    bytes.push(node.address);
                }
                bytes.extend_from_slice(line.as_bytes());
                bytes.push(b'\r');
                replies.push(PendingLine {
                    deliver_at_ms: now + node.latency_ms,
                    bytes,
                });
            }
        }
        self.pending.extend(replies);
    }

    /// Advances time and returns the bytes due for delivery, in order.
    pub fn tick(&mut self, duration_ms: u64) -> Vec<u8> {
        self.current_time_ms += duration_ms;
        let now = self.current_time_ms;
        self.pending.sort_by_key(|line| line.deliver_at_ms);
        let due = self.pending.iter().take_while(|line| line.deliver_at_ms <= now).count();
        self.pending.drain(..due).flat_map(|line| line.bytes).collect()
    }
}

pub type SimulatedEngine<'r> = BusEngine<'r, SimulatedTransport, SimulatedClock<'r>>;

/// Builds a bus engine wired to the virtual bus.
pub fn engine<'r>(bus: &Rc<RefCell<VirtualBus>>, ring: &'r ReplyRing, config: BusConfig) -> SimulatedEngine<'r> {
    let local = dinfox_rs::NodeAddress(0x00);
    BusEngine::new(
        SimulatedTransport::new(bus.clone()),
        SimulatedClock::new(bus.clone(), ring),
        ring,
        config,
        local,
    )
}

/// Configuration store holding the master address.
pub struct MemoryStore {
    pub bus_address: Option<u8>,
}

impl ConfigStore for MemoryStore {
    fn read_byte(&mut self, key: ConfigKey) -> Result<u8, DinfoxError> {
        match key {
            ConfigKey::BusAddress => self.bus_address.ok_or(DinfoxError::ConfigStore),
        }
    }
}

#[derive(Default)]
pub struct CountingWatchdog {
    pub reloads: u32,
}

impl Watchdog for CountingWatchdog {
    fn reload(&mut self) {
        self.reloads += 1;
    }
}

/// Radio accepting every frame.
#[derive(Default)]
pub struct RecordingRadio {
    pub frames: Vec<Vec<u8>>,
}

impl Radio for RecordingRadio {
    fn send_uplink(&mut self, payload: &[u8], _bidirectional: bool) -> Result<UplinkStatus, DinfoxError> {
        self.frames.push(payload.to_vec());
        Ok(UplinkStatus {
            accepted: true,
            downlink: None,
        })
    }
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
