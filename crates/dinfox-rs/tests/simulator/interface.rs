// crates/dinfox-rs/tests/simulator/interface.rs
use super::VirtualBus;
use dinfox_rs::ReplyRing;
use dinfox_rs::hal::{BusTransport, Clock, DinfoxError};
use std::cell::RefCell;
use std::rc::Rc;

/// Half-duplex transceiver attached to the virtual bus.
pub struct SimulatedTransport {
    bus: Rc<RefCell<VirtualBus>>,
    pub rx_enabled: bool,
    pub powered: bool,
    pub power_cycles: u32,
    pub fail_send: bool,
}

impl SimulatedTransport {
    pub fn new(bus: Rc<RefCell<VirtualBus>>) -> Self {
        Self {
            bus,
            rx_enabled: false,
            powered: true,
            power_cycles: 0,
            fail_send: false,
        }
    }
}

impl BusTransport for SimulatedTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), DinfoxError> {
        assert!(!self.rx_enabled, "receiver enabled while transmitting");
        if self.fail_send || !self.powered {
            return Err(DinfoxError::TransportFailure);
        }
        self.bus.borrow_mut().transmit(bytes);
        Ok(())
    }

    fn enable_rx(&mut self) {
        self.rx_enabled = true;
    }

    fn disable_rx(&mut self) {
        self.rx_enabled = false;
    }

    fn power_on(&mut self) -> Result<(), DinfoxError> {
        self.powered = true;
        Ok(())
    }

    fn power_off(&mut self) {
        self.powered = false;
        self.power_cycles += 1;
    }
}

/// Clock advancing simulated time; due bytes are fed to the reply ring as
/// the receive interrupt would.
pub struct SimulatedClock<'r> {
    bus: Rc<RefCell<VirtualBus>>,
    ring: &'r ReplyRing,
}

impl<'r> SimulatedClock<'r> {
    pub fn new(bus: Rc<RefCell<VirtualBus>>, ring: &'r ReplyRing) -> Self {
        Self { bus, ring }
    }
}

impl Clock for SimulatedClock<'_> {
    fn delay_ms(&mut self, ms: u32) -> Result<(), DinfoxError> {
        let bytes = self.bus.borrow_mut().tick(ms as u64);
        bytes.into_iter().for_each(|byte| self.ring.on_byte_received(byte));
        Ok(())
    }
}
