// crates/dinfox-rs/src/bus/power.rs
use super::engine::BusEngine;
use crate::hal::{BusTransport, Clock, DinfoxError};
use core::ops::{Deref, DerefMut};
use log::trace;

/// Keeps the bus powered for its lifetime.
///
/// Derefs to the engine, so scans and register accesses run through the
/// guard. The transceiver is powered off on drop, and also when powering on
/// fails.
pub struct PoweredBus<'e, 'r, T: BusTransport, C: Clock> {
    engine: &'e mut BusEngine<'r, T, C>,
}

impl<'e, 'r, T: BusTransport, C: Clock> PoweredBus<'e, 'r, T, C> {
    pub fn on(engine: &'e mut BusEngine<'r, T, C>) -> Result<Self, DinfoxError> {
        if let Err(e) = engine.transport_mut().power_on() {
            engine.transport_mut().power_off();
            return Err(e);
        }
        trace!("[BUS] Powered on.");
        Ok(Self { engine })
    }
}

impl<'r, T: BusTransport, C: Clock> Deref for PoweredBus<'_, 'r, T, C> {
    type Target = BusEngine<'r, T, C>;

    fn deref(&self) -> &Self::Target {
        &*self.engine
    }
}

impl<T: BusTransport, C: Clock> DerefMut for PoweredBus<'_, '_, T, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.engine
    }
}

impl<T: BusTransport, C: Clock> Drop for PoweredBus<'_, '_, T, C> {
    fn drop(&mut self) {
        self.engine.transport_mut().power_off();
        trace!("[BUS] Powered off.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ReplyRing;
    use crate::config::BusConfig;
    use crate::types::NodeAddress;

    #[derive(Default)]
    struct SupplyTransport {
        powered: bool,
        power_ons: u32,
        power_offs: u32,
        fail_power_on: bool,
    }

    impl BusTransport for SupplyTransport {
        fn send(&mut self, _bytes: &[u8]) -> Result<(), DinfoxError> {
            assert!(self.powered, "bus used while powered off");
            Ok(())
        }
        fn enable_rx(&mut self) {}
        fn disable_rx(&mut self) {}
        fn power_on(&mut self) -> Result<(), DinfoxError> {
            self.power_ons += 1;
            if self.fail_power_on {
                return Err(DinfoxError::TransportFailure);
            }
            self.powered = true;
            Ok(())
        }
        fn power_off(&mut self) {
            self.powered = false;
            self.power_offs += 1;
        }
    }

    struct NoClock;

    impl Clock for NoClock {
        fn delay_ms(&mut self, _ms: u32) -> Result<(), DinfoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_bus_is_powered_while_guard_lives() {
        let ring = ReplyRing::new();
        let mut engine = BusEngine::new(SupplyTransport::default(), NoClock, &ring, BusConfig::default(), NodeAddress(0));
        {
            let mut bus = PoweredBus::on(&mut engine).unwrap();
            assert!(bus.transport_mut().powered);
            bus.send_command(Some(NodeAddress(0x05)), "RS").unwrap();
        }
        let transport = engine.transport_mut();
        assert!(!transport.powered);
        assert_eq!((transport.power_ons, transport.power_offs), (1, 1));
    }

    #[test]
    fn test_failed_power_on_leaves_bus_off() {
        let ring = ReplyRing::new();
        let transport = SupplyTransport {
            fail_power_on: true,
            ..SupplyTransport::default()
        };
        let mut engine = BusEngine::new(transport, NoClock, &ring, BusConfig::default(), NodeAddress(0));
        assert!(matches!(PoweredBus::on(&mut engine), Err(DinfoxError::TransportFailure)));
        assert!(!engine.transport_mut().powered);
        assert_eq!(engine.transport_mut().power_offs, 1);
    }
}
