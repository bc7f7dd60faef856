// crates/dinfox-rs/src/uplink/scheduler.rs
//! Periodic radio uplink of the node data.

use super::payload::{PayloadType, UplinkPayload};
use crate::bus::{BusEngine, PoweredBus};
use crate::config::UplinkConfig;
use crate::hal::{BusTransport, Clock, DinfoxError, Radio, Watchdog};
use crate::node::NodeManager;
use log::{debug, info, trace, warn};

/// Collaborators borrowed by one scheduler run.
pub struct UplinkContext<'c, 'r, T: BusTransport, C: Clock, R: Radio, W: Watchdog> {
    pub engine: &'c mut BusEngine<'r, T, C>,
    pub nodes: &'c mut NodeManager,
    pub radio: &'c mut R,
    pub watchdog: &'c mut W,
}

/// Result of one scheduler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The period has not elapsed yet.
    Idle,
    /// One frame was accepted by the radio.
    Sent(UplinkPayload),
}

/// Sends one uplink per period, cycling over (node, payload type).
#[derive(Debug, Clone)]
pub struct UplinkScheduler {
    config: UplinkConfig,
    seconds_count: u32,
    node_index: usize,
    payload_type: PayloadType,
    last_downlink: Option<[u8; 8]>,
}

impl UplinkScheduler {
    /// The first call to [`UplinkScheduler::task`] sends immediately.
    pub fn new(config: UplinkConfig) -> Self {
        Self {
            seconds_count: config.period_seconds,
            config,
            node_index: 0,
            payload_type: PayloadType::Startup,
            last_downlink: None,
        }
    }

    pub fn config(&self) -> &UplinkConfig {
        &self.config
    }

    /// Node index and payload type of the next attempt.
    pub fn cursor(&self) -> (usize, PayloadType) {
        (self.node_index, self.payload_type)
    }

    /// Downlink received with the last bidirectional uplink.
    pub fn last_downlink(&self) -> Option<[u8; 8]> {
        self.last_downlink
    }

    fn advance(&mut self, node_count: usize) {
        match self.payload_type.next() {
            Some(next) => self.payload_type = next,
            None => {
                self.payload_type = PayloadType::Startup;
                self.node_index = (self.node_index + 1) % node_count.max(1);
            }
        }
    }

    /// Accumulates `elapsed_seconds` and runs an uplink cycle once the period
    /// has elapsed.
    ///
    /// The bus is powered during the cycle and always powered off before
    /// returning.
    ///
    /// An empty node table (no scan yet) cannot hold a radio gateway, so it
    /// is reported as `NoRadioModule` without powering the bus.
    pub fn task<T, C, R, W>(
        &mut self,
        ctx: UplinkContext<'_, '_, T, C, R, W>,
        elapsed_seconds: u32,
    ) -> Result<TaskOutcome, DinfoxError>
    where
        T: BusTransport,
        C: Clock,
        R: Radio,
        W: Watchdog,
    {
        self.seconds_count = self.seconds_count.saturating_add(elapsed_seconds);
        if self.seconds_count < self.config.period_seconds {
            return Ok(TaskOutcome::Idle);
        }
        self.seconds_count = 0;
        if ctx.nodes.nodes().is_empty() {
            warn!("[UPLINK] Node table is empty (bus not scanned), no radio gateway.");
            return Err(DinfoxError::NoRadioModule);
        }
        let mut bus = PoweredBus::on(ctx.engine)?;
        self.cycle(&mut *bus, ctx.nodes, ctx.radio, ctx.watchdog)
    }

    fn cycle<T, C, R, W>(
        &mut self,
        engine: &mut BusEngine<'_, T, C>,
        nodes: &mut NodeManager,
        radio: &mut R,
        watchdog: &mut W,
    ) -> Result<TaskOutcome, DinfoxError>
    where
        T: BusTransport,
        C: Clock,
        R: Radio,
        W: Watchdog,
    {
        let mut attempts: u32 = 0;
        loop {
            if attempts >= self.config.loop_max {
                warn!("[UPLINK] No frame sent after {} attempt(s).", attempts);
                return Err(DinfoxError::IterationLimitExceeded);
            }
            attempts += 1;
            watchdog.reload();
            let (node_index, payload_type) = self.cursor();
            self.advance(nodes.nodes().len());
            match self.attempt(engine, nodes, radio, node_index, payload_type) {
                Ok(payload) => return Ok(TaskOutcome::Sent(payload)),
                Err(DinfoxError::NotSupported) | Err(DinfoxError::PayloadEmpty) => {
                    trace!("[UPLINK] Nothing to send for node {} {:?}.", node_index, payload_type);
                }
                Err(e) => {
                    warn!("[UPLINK] Cycle aborted on node {} {:?}: {}", node_index, payload_type, e);
                    return Err(e);
                }
            }
        }
    }

    fn attempt<T, C, R>(
        &mut self,
        engine: &mut BusEngine<'_, T, C>,
        nodes: &mut NodeManager,
        radio: &mut R,
        node_index: usize,
        payload_type: PayloadType,
    ) -> Result<UplinkPayload, DinfoxError>
    where
        T: BusTransport,
        C: Clock,
        R: Radio,
    {
        nodes.update_all_string_data(engine, node_index)?;
        let payload = nodes.encode_uplink_payload(node_index, payload_type)?;
        if nodes.gateway().is_none() {
            return Err(DinfoxError::NoRadioModule);
        }
        let status = radio.send_uplink(payload.as_bytes(), self.config.bidirectional)?;
        if !status.accepted {
            return Err(DinfoxError::UplinkRejected);
        }
        if let Some(downlink) = status.downlink {
            debug!("[UPLINK] Downlink received: {:02X?}", downlink);
            self.last_downlink = Some(downlink);
        }
        info!(
            "[UPLINK] Sent {:?} of node {} ({} bytes).",
            payload_type,
            node_index,
            payload.len()
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ReplyRing;
    use crate::config::BusConfig;
    use crate::hal::{NoOpWatchdog, UplinkStatus};
    use crate::node::{Node, NodeTable};
    use crate::types::{BoardId, NodeAddress};
    use alloc::vec::Vec;

    /// Transport whose nodes never answer; counts power cycles.
    #[derive(Default)]
    struct MuteTransport {
        powered: bool,
        power_offs: u32,
        fail_power_on: bool,
    }

    impl BusTransport for MuteTransport {
        fn send(&mut self, _bytes: &[u8]) -> Result<(), DinfoxError> {
            assert!(self.powered, "bus used while powered off");
            Ok(())
        }
        fn enable_rx(&mut self) {}
        fn disable_rx(&mut self) {}
        fn power_on(&mut self) -> Result<(), DinfoxError> {
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

    #[derive(Default)]
    struct RecordingRadio {
        frames: Vec<Vec<u8>>,
        reject: bool,
    }

    impl Radio for RecordingRadio {
        fn send_uplink(&mut self, payload: &[u8], bidirectional: bool) -> Result<UplinkStatus, DinfoxError> {
            self.frames.push(payload.to_vec());
            Ok(UplinkStatus {
                accepted: !self.reject,
                downlink: bidirectional.then_some([0xD0; 8]),
            })
        }
    }

    fn manager(boards: &[BoardId]) -> NodeManager {
        let mut table = NodeTable::new();
        for (address, board_id) in boards.iter().enumerate() {
            table.push(Node::new(Some(NodeAddress(address as u8)), *board_id)).unwrap();
        }
        NodeManager::from_table(table)
    }

    fn run(
        scheduler: &mut UplinkScheduler,
        engine: &mut BusEngine<'_, MuteTransport, NoClock>,
        nodes: &mut NodeManager,
        radio: &mut RecordingRadio,
        elapsed_seconds: u32,
    ) -> Result<TaskOutcome, DinfoxError> {
        let ctx = UplinkContext {
            engine,
            nodes,
            radio,
            watchdog: &mut NoOpWatchdog,
        };
        scheduler.task(ctx, elapsed_seconds)
    }

    #[test]
    fn test_first_task_sends_then_waits_for_period() {
        let ring = ReplyRing::new();
        let mut engine = BusEngine::new(MuteTransport::default(), NoClock, &ring, BusConfig::default(), NodeAddress(0));
        let mut nodes = manager(&[BoardId::Dmm, BoardId::Uhfm]);
        let mut radio = RecordingRadio::default();
        let mut scheduler = UplinkScheduler::new(UplinkConfig::default());

        let outcome = run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 0).unwrap();
        let TaskOutcome::Sent(payload) = outcome else {
            panic!("expected a frame");
        };
        // The master board has no data; the gateway sends its startup record.
        assert_eq!(payload.payload_type(), PayloadType::Startup);
        assert_eq!(payload.header().board_id, u8::from(BoardId::Uhfm));
        assert_eq!(scheduler.cursor(), (1, PayloadType::Monitoring));
        assert_eq!(engine.transport_mut().power_offs, 1);
        assert!(!engine.transport_mut().powered);

        assert_eq!(
            run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 299).unwrap(),
            TaskOutcome::Idle
        );
        assert!(matches!(
            run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 1).unwrap(),
            TaskOutcome::Sent(_)
        ));
        assert_eq!(radio.frames.len(), 2);
    }

    #[test]
    fn test_iteration_cap() {
        let ring = ReplyRing::new();
        let mut engine = BusEngine::new(MuteTransport::default(), NoClock, &ring, BusConfig::default(), NodeAddress(0));
        let mut nodes = manager(&[BoardId::Dmm]);
        let mut radio = RecordingRadio::default();
        let mut scheduler = UplinkScheduler::new(UplinkConfig {
            loop_max: 5,
            ..UplinkConfig::default()
        });
        assert_eq!(
            run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 0),
            Err(DinfoxError::IterationLimitExceeded)
        );
        assert!(radio.frames.is_empty());
        assert_eq!(engine.transport_mut().power_offs, 1);
        // 5 attempts over one node: Startup, Monitoring, Data, Startup, Monitoring.
        assert_eq!(scheduler.cursor(), (0, PayloadType::Data));
    }

    #[test]
    fn test_missing_gateway_aborts_after_encoding() {
        let ring = ReplyRing::new();
        let mut engine = BusEngine::new(MuteTransport::default(), NoClock, &ring, BusConfig::default(), NodeAddress(0));
        let mut nodes = manager(&[BoardId::Dmm, BoardId::Lvrm]);
        let mut radio = RecordingRadio::default();
        let mut scheduler = UplinkScheduler::new(UplinkConfig::default());
        assert_eq!(
            run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 0),
            Err(DinfoxError::NoRadioModule)
        );
        assert_eq!(scheduler.cursor(), (1, PayloadType::Monitoring));
        assert!(!engine.transport_mut().powered);
    }

    #[test]
    fn test_empty_table_has_no_gateway() {
        let ring = ReplyRing::new();
        let mut engine = BusEngine::new(MuteTransport::default(), NoClock, &ring, BusConfig::default(), NodeAddress(0));
        let mut nodes = NodeManager::new();
        let mut radio = RecordingRadio::default();
        let mut scheduler = UplinkScheduler::new(UplinkConfig::default());
        assert_eq!(
            run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 0),
            Err(DinfoxError::NoRadioModule)
        );
        assert_eq!(engine.transport_mut().power_offs, 0);
        assert!(radio.frames.is_empty());
        // The period restarts: the next call waits again.
        assert_eq!(
            run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 1).unwrap(),
            TaskOutcome::Idle
        );
    }

    #[test]
    fn test_rejection_and_downlink() {
        let ring = ReplyRing::new();
        let mut engine = BusEngine::new(MuteTransport::default(), NoClock, &ring, BusConfig::default(), NodeAddress(0));
        let mut nodes = manager(&[BoardId::Uhfm]);
        let mut radio = RecordingRadio {
            reject: true,
            ..RecordingRadio::default()
        };
        let mut scheduler = UplinkScheduler::new(UplinkConfig {
            bidirectional: true,
            ..UplinkConfig::default()
        });
        assert_eq!(
            run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 0),
            Err(DinfoxError::UplinkRejected)
        );
        assert_eq!(scheduler.last_downlink(), None);

        radio.reject = false;
        run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 300).unwrap();
        assert_eq!(scheduler.last_downlink(), Some([0xD0; 8]));
    }

    #[test]
    fn test_power_on_failure_powers_off() {
        let ring = ReplyRing::new();
        let transport = MuteTransport {
            fail_power_on: true,
            ..MuteTransport::default()
        };
        let mut engine = BusEngine::new(transport, NoClock, &ring, BusConfig::default(), NodeAddress(0));
        let mut nodes = manager(&[BoardId::Uhfm]);
        let mut radio = RecordingRadio::default();
        let mut scheduler = UplinkScheduler::new(UplinkConfig::default());
        assert_eq!(
            run(&mut scheduler, &mut engine, &mut nodes, &mut radio, 0),
            Err(DinfoxError::TransportFailure)
        );
        assert_eq!(engine.transport_mut().power_offs, 1);
    }
}
