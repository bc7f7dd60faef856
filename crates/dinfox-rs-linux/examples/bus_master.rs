// crates/dinfox-rs-linux/examples/bus_master.rs
//! Runs a DinFox bus master on a serial RS485 adapter.
//!
//! Scans the bus, prints the string data of every node, then sends one radio
//! uplink per period through the logging radio.
//!
//! To run this example:
//!    cargo run -p dinfox-rs-linux --example bus_master -- master.toml
//!
//! `master.toml` holds the `[serial]`, `[bus]` and `[uplink]` sections and
//! the path of the store file (`store = "store.toml"`, containing
//! `bus_address = 0`).

use dinfox_rs::{
    BusEngine, BusTransport, Clock, DinfoxError, NoOpWatchdog, NodeAddress, NodeManager, PoweredBus, ReplyRing,
    TaskOutcome, UplinkContext, UplinkScheduler,
};
use dinfox_rs_linux::{FileConfigStore, HostConfig, LoggingRadio, SerialTransport, StdClock};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, process, thread};

/// Scans the bus and prints the string data of every node, with the bus
/// powered for the whole discovery.
fn discover<T: BusTransport, C: Clock>(
    engine: &mut BusEngine<'_, T, C>,
    nodes: &mut NodeManager,
    store: &mut FileConfigStore,
    watchdog: &mut NoOpWatchdog,
) -> Result<(), DinfoxError> {
    let mut bus = PoweredBus::on(engine)?;
    nodes.scan(&mut *bus, store, watchdog)?;
    for node_index in 0..nodes.nodes().len() {
        let Ok(name) = nodes.board_name(node_index) else {
            continue;
        };
        info!("Node {}: {}", node_index, name);
        if nodes.update_all_string_data(&mut *bus, node_index).is_err() {
            continue;
        }
        let last = nodes.last_string_data_index(node_index).unwrap_or(0);
        for string_data_index in 0..last {
            if let Ok(slot) = nodes.read_string_data(node_index, string_data_index) {
                info!("    {}", slot);
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = env::args().nth(1).unwrap_or_else(|| "master.toml".to_string());
    let config = match HostConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!("Cannot load {}: {}", path, e);
            process::exit(1);
        }
    };

    let ring = Arc::new(ReplyRing::new());
    let transport = match SerialTransport::open(
        &config.serial.path,
        config.serial.baud_rate,
        config.master.bus.mode,
        ring.clone(),
    ) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Cannot open the bus: {}", e);
            process::exit(1);
        }
    };
    let mut engine = BusEngine::new(transport, StdClock, &ring, config.master.bus.clone(), NodeAddress(0));
    let mut store = FileConfigStore::new(config.store.clone().unwrap_or_else(|| "store.toml".into()));
    let mut watchdog = NoOpWatchdog;
    let mut radio = LoggingRadio::default();

    let mut nodes = NodeManager::new();
    if let Err(e) = discover(&mut engine, &mut nodes, &mut store, &mut watchdog) {
        error!("Bus scan failed: {}", e);
        process::exit(1);
    }

    let mut scheduler = UplinkScheduler::new(config.master.uplink.clone());
    let mut last_tick = Instant::now();
    loop {
        thread::sleep(Duration::from_secs(1));
        let elapsed_seconds = last_tick.elapsed().as_secs() as u32;
        if elapsed_seconds == 0 {
            continue;
        }
        last_tick = Instant::now();
        let ctx = UplinkContext {
            engine: &mut engine,
            nodes: &mut nodes,
            radio: &mut radio,
            watchdog: &mut watchdog,
        };
        match scheduler.task(ctx, elapsed_seconds) {
            Ok(TaskOutcome::Sent(payload)) => info!("Uplink sent: {:02X?}", payload.as_bytes()),
            Ok(TaskOutcome::Idle) => {}
            Err(e) => warn!("Uplink cycle failed: {}", e),
        }
    }
}
