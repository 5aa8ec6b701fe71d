//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Device / MainLoop (domain)
//! ```
//!
//! Every collaborator the firmware talks to (ADC, LED, NVS, Wi-Fi and BLE
//! stacks, HTTP, WebSocket and network-upload listeners, the flash update
//! primitive) sits behind one of these traits.  The
//! [`Device`](crate::device::Device) bundle owns them as boxed trait
//! objects, so the domain core never touches hardware directly and the
//! integration tests can swap in mocks.
//!
//! All port errors are typed and `Copy`; callers log and degrade.

use std::io::{Read, Write};
use std::net::Ipv4Addr;

use crate::app::espota::Invitation;
use crate::app::events::AppEvent;
use crate::app::http::{HttpReply, HttpRequest, PostAction};
use crate::config::{BleConfig, NetworkConfig};
use crate::error::{BleError, FlashError, RadioError, ServerError};

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS)
// ───────────────────────────────────────────────────────────────

/// Persistent string key-value storage.
///
/// Each call opens the namespace, performs its work and closes it again;
/// no handle outlives a single operation.
pub trait StoragePort {
    /// Read a string value.  `Ok(None)` when the key is absent.
    fn get_str(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError>;

    /// Write several keys in order, then commit.  On error the keys before
    /// the failing one may already be stored.
    fn set_strs(&mut self, namespace: &str, entries: &[(&str, &str)]) -> Result<(), StorageError>;

    /// Remove every key in the namespace.  Erasing an empty namespace
    /// succeeds.
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError>;
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Namespace does not exist yet (never written).
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error (open, read, or commit failed).
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "namespace not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Radio port (driven adapter: domain → Wi-Fi driver)
// ───────────────────────────────────────────────────────────────

/// Driver operating mode as reported by the Wi-Fi stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    Off,
    Station,
    AccessPoint,
    ApStation,
}

impl RadioMode {
    /// Wire name used by the status API.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Station => "sta",
            Self::AccessPoint => "ap",
            Self::ApStation => "ap_sta",
        }
    }

    pub const fn has_ap(self) -> bool {
        matches!(self, Self::AccessPoint | Self::ApStation)
    }

    pub const fn has_station(self) -> bool {
        matches!(self, Self::Station | Self::ApStation)
    }
}

/// Station-side link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationStatus {
    /// No attempt made.
    Idle,
    Connecting,
    /// Associated and holding an IP address.
    Connected,
    Disconnected,
    Failed,
}

/// One scan result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: String,
    pub rssi: i8,
    pub secure: bool,
}

/// Wi-Fi driver operations.
pub trait RadioPort {
    /// Drop persisted driver state (RAM-only storage), disconnect, and
    /// switch to combined AP + station mode.
    fn reset(&mut self) -> Result<(), RadioError>;

    /// Bring up the soft-AP.
    fn start_ap(&mut self, network: &NetworkConfig) -> Result<(), RadioError>;

    /// Issue a non-blocking station connect.
    fn begin_station(&mut self, ssid: &str, password: &str) -> Result<(), RadioError>;

    /// Current station status (polled).
    fn station_status(&mut self) -> StationStatus;

    fn mode(&self) -> RadioMode;

    /// SSID the station is associated with, if any.
    fn station_ssid(&self) -> Option<String>;

    fn station_ip(&self) -> Option<Ipv4Addr>;

    fn ap_ip(&self) -> Option<Ipv4Addr>;

    /// Blocking scan of visible networks.
    fn scan(&mut self) -> Result<Vec<ScanEntry>, RadioError>;
}

// ───────────────────────────────────────────────────────────────
// mDNS port
// ───────────────────────────────────────────────────────────────

/// A DNS-SD service record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdnsService {
    /// Service type, e.g. `_http`.
    pub service: &'static str,
    /// Protocol, e.g. `_tcp`.
    pub proto: &'static str,
    pub port: u16,
}

pub trait MdnsPort {
    /// Start the responder and register `services` under `hostname.local`.
    fn start(
        &mut self,
        hostname: &str,
        instance: &str,
        services: &[MdnsService],
    ) -> Result<(), RadioError>;
}

// ───────────────────────────────────────────────────────────────
// Time and system ports
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.
pub trait ClockPort {
    /// Milliseconds since boot, wrapping at 2^32.
    fn now_ms(&self) -> u32;

    /// Block the calling (main) task.
    fn delay_ms(&mut self, ms: u32);
}

/// Partition table entry, for the boot dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub label: String,
    pub kind: PartitionKind,
    pub subtype: u8,
    pub address: u32,
    pub size: u32,
}

/// Partition type, numbered as in the partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PartitionKind {
    App = 0,
    Data = 1,
}

pub trait SystemPort {
    /// Reset the chip.  Never returns on hardware.
    fn restart(&mut self);

    /// Cancel a pending rollback for the running image.
    fn mark_running_image_valid(&mut self);

    /// Flash partition table.
    fn partitions(&self) -> Vec<PartitionInfo>;
}

// ───────────────────────────────────────────────────────────────
// Sampling and serial
// ───────────────────────────────────────────────────────────────

/// Raw FSR input.
pub trait AdcPort {
    /// Read one channel.  Implementations return the last good value on a
    /// failed conversion.
    fn read(&mut self, channel: usize) -> u16;
}

/// USB serial text output.
pub trait SerialPort {
    /// Write `line` followed by LF.
    fn write_line(&mut self, line: &str);
}

// ───────────────────────────────────────────────────────────────
// Streaming transports
// ───────────────────────────────────────────────────────────────

/// WebSocket broadcast server.
pub trait WebSocketPort {
    fn start(&mut self, port: u16) -> Result<(), ServerError>;

    /// Drain inbound frames and session changes.  Returns the number of
    /// inbound frames discarded.
    fn service(&mut self) -> usize;

    fn client_count(&self) -> usize;

    /// Send `text` as one text frame to every client; clients whose send
    /// fails are dropped.
    fn broadcast_text(&mut self, text: &str);
}

/// BLE GATT notify server (one central).
pub trait BlePort {
    /// Bring up the stack, register the service, start advertising.
    fn init(&mut self, config: &BleConfig) -> Result<(), BleError>;

    fn is_connected(&self) -> bool;

    /// The TX characteristic was created.
    fn has_characteristic(&self) -> bool;

    /// Set the characteristic value and notify the central.
    fn notify(&mut self, payload: &[u8]);

    fn restart_advertising(&mut self);
}

// ───────────────────────────────────────────────────────────────
// HTTP surface
// ───────────────────────────────────────────────────────────────

/// Request handler invoked by an [`HttpServerPort`] on the main task.
pub trait HttpHandler {
    fn handle(&mut self, request: &mut HttpRequest<'_>) -> HttpReply;
}

pub trait HttpServerPort {
    fn start(&mut self, port: u16) -> Result<(), ServerError>;

    /// Serve at most one pending request.  Returns the reply's post-send
    /// action once the response has been written.
    fn poll(&mut self, handler: &mut dyn HttpHandler) -> Option<PostAction>;
}

// ───────────────────────────────────────────────────────────────
// Firmware update
// ───────────────────────────────────────────────────────────────

/// Flash writer for the inactive application slot.
pub trait FlashWriterPort {
    /// Bytes available in the next update partition.
    fn free_space(&self) -> u32;

    fn begin(&mut self, max_size: u32) -> Result<(), FlashError>;

    /// Append a chunk.  Returns the number of bytes accepted.
    fn write(&mut self, chunk: &[u8]) -> usize;

    /// Verify and select the new image for next boot.  Returns the image
    /// size.
    fn end(&mut self) -> Result<u32, FlashError>;

    fn abort(&mut self);
}

/// Data connection of a network upload: image bytes in, progress out.
pub trait ImageStream: Read + Write {}

impl<T: Read + Write> ImageStream for T {}

/// Network-upload listener (espota protocol).
pub trait NetUpdatePort {
    fn start(&mut self, port: u16) -> Result<(), ServerError>;

    /// Next well-formed invitation, already acknowledged to its sender.
    fn poll_invitation(&mut self) -> Option<Invitation>;

    /// Open the data connection back to the sender of `invite`.
    fn connect(&mut self, invite: &Invitation) -> Result<Box<dyn ImageStream>, ServerError>;
}

// ───────────────────────────────────────────────────────────────
// Status LED and event sink
// ───────────────────────────────────────────────────────────────

pub trait LedPort {
    fn set(&mut self, on: bool);
}

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}
