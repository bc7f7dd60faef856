// crates/dinfox-rs-linux/src/lib.rs
#![cfg(target_os = "linux")]

use dinfox_rs::hal::{BusTransport, Clock, ConfigKey, ConfigStore, DinfoxError, Radio, UplinkStatus};
use dinfox_rs::{AddressingMode, MasterConfig, ReplyRing};
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_serial::SerialPort;

const READ_TIMEOUT: Duration = Duration::from_millis(5);
const DESTINATION_ADDRESS_MARKER: u8 = 0x80;
const FRAME_END: u8 = b'\r';

/// Drops the destination byte that starts every multi-address frame, so the
/// reply ring sees `[source, payload..., '\r']`.
#[derive(Debug, Clone, Copy)]
struct InboundFilter {
    strip_destination: bool,
    at_line_start: bool,
}

impl InboundFilter {
    fn new(mode: AddressingMode) -> Self {
        Self {
            strip_destination: mode == AddressingMode::MultiAddress,
            at_line_start: true,
        }
    }

    fn accept(&mut self, byte: u8) -> bool {
        let line_start = self.at_line_start;
        self.at_line_start = byte == FRAME_END;
        !(self.strip_destination && line_start && byte & DESTINATION_ADDRESS_MARKER != 0)
    }
}

/// Receive side shared by the reader thread and the transport.
///
/// Every chunk read from the port is delivered under the filter lock, and
/// `close` takes that lock after clearing `enabled`. Once `close` returns no
/// byte reaches the reply ring until `open`, so the ring may be reset.
struct RxPath {
    enabled: AtomicBool,
    mode: AddressingMode,
    filter: Mutex<InboundFilter>,
    ring: Arc<ReplyRing>,
}

impl RxPath {
    fn new(mode: AddressingMode, ring: Arc<ReplyRing>) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            mode,
            filter: Mutex::new(InboundFilter::new(mode)),
            ring,
        }
    }

    fn open(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Returns once the chunk being delivered, if any, has stopped.
    fn close(&self) {
        self.enabled.store(false, Ordering::Release);
        let mut filter = self.lock_filter();
        *filter = InboundFilter::new(self.mode);
    }

    fn deliver(&self, bytes: &[u8]) {
        let mut filter = self.lock_filter();
        for byte in bytes {
            if !self.enabled.load(Ordering::Acquire) {
                return;
            }
            if filter.accept(*byte) {
                self.ring.on_byte_received(*byte);
            }
        }
    }

    fn lock_filter(&self) -> MutexGuard<'_, InboundFilter> {
        self.filter.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// RS485 transceiver behind a serial port (USB adapter or UART).
///
/// A reader thread feeds received bytes to the reply ring while the receiver
/// is enabled; `disable_rx` waits for it to stop. The DTR line drives the
/// transceiver supply.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    rx: Arc<RxPath>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32, mode: AddressingMode, ring: Arc<ReplyRing>) -> Result<Self, DinfoxError> {
        let port = tokio_serial::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| {
                error!("[BUS] Failed to open serial port {}: {}", path, e);
                DinfoxError::TransportFailure
            })?;
        let mut reader_port = port.try_clone().map_err(|e| {
            error!("[BUS] Failed to clone serial port {}: {}", path, e);
            DinfoxError::TransportFailure
        })?;
        info!("[BUS] Opened {} at {} baud ({:?}).", path, baud_rate, mode);

        let rx = Arc::new(RxPath::new(mode, ring));
        let stop = Arc::new(AtomicBool::new(false));
        let reader = {
            let rx = rx.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut buffer = [0u8; 64];
                while !stop.load(Ordering::Relaxed) {
                    match reader_port.read(&mut buffer) {
                        Ok(count) => rx.deliver(&buffer[..count]),
                        Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                        Err(e) => {
                            error!("[BUS] Serial read failed: {}", e);
                            break;
                        }
                    }
                }
                debug!("[BUS] Reader thread stopped.");
            })
        };

        Ok(Self {
            port,
            rx,
            stop,
            reader: Some(reader),
        })
    }
}

impl BusTransport for SerialTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<(), DinfoxError> {
        trace!("[BUS] TX {:02X?}", bytes);
        self.port
            .write_all(bytes)
            .and_then(|_| self.port.flush())
            .map_err(|e| {
                warn!("[BUS] Serial write failed: {}", e);
                DinfoxError::TransportFailure
            })
    }

    fn enable_rx(&mut self) {
        self.rx.open();
    }

    fn disable_rx(&mut self) {
        self.rx.close();
    }

    fn power_on(&mut self) -> Result<(), DinfoxError> {
        self.port.write_data_terminal_ready(true).map_err(|e| {
            warn!("[BUS] Failed to power the transceiver: {}", e);
            DinfoxError::TransportFailure
        })
    }

    fn power_off(&mut self) {
        if let Err(e) = self.port.write_data_terminal_ready(false) {
            warn!("[BUS] Failed to power the transceiver off: {}", e);
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

/// Wall-clock delays.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdClock;

impl Clock for StdClock {
    fn delay_ms(&mut self, ms: u32) -> Result<(), DinfoxError> {
        thread::sleep(Duration::from_millis(ms as u64));
        Ok(())
    }
}

/// Contents of the persistent store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreContents {
    pub bus_address: u8,
}

/// Configuration store backed by a TOML file, read on every access.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write(&self, contents: &StoreContents) -> Result<(), ConfigError> {
        let text = toml::to_string(contents)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn read_byte(&mut self, key: ConfigKey) -> Result<u8, DinfoxError> {
        let contents: StoreContents = read_toml(&self.path).map_err(|e| {
            warn!("[CONFIG] Failed to read {}: {}", self.path.display(), e);
            DinfoxError::ConfigStore
        })?;
        match key {
            ConfigKey::BusAddress => Ok(contents.bus_address),
        }
    }
}

/// Radio stand-in that logs every frame and accepts it.
#[derive(Debug, Default)]
pub struct LoggingRadio {
    pub sent: u32,
}

impl Radio for LoggingRadio {
    fn send_uplink(&mut self, payload: &[u8], bidirectional: bool) -> Result<UplinkStatus, DinfoxError> {
        self.sent += 1;
        info!("[UPLINK] Frame {:02X?} (bidirectional: {}).", payload, bidirectional);
        Ok(UplinkStatus {
            accepted: true,
            downlink: None,
        })
    }
}

/// Serial port settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub path: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: 1200,
        }
    }
}

/// Complete host configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub serial: SerialConfig,
    /// Path of the persistent store file.
    pub store: Option<PathBuf>,
    #[serde(flatten)]
    pub master: MasterConfig,
}

impl HostConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        read_toml(path.as_ref())
    }
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Parse(e) => write!(f, "Invalid configuration: {}", e),
            Self::Serialize(e) => write!(f, "Cannot serialize configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(e: toml::ser::Error) -> Self {
        ConfigError::Serialize(e)
    }
}
