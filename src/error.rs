//! Unified error types for the Cardinal Grip firmware.
//!
//! Every subsystem error is a small `Copy` enum with its own `Display`, and
//! all of them convert into the top-level [`Error`].  None of these ever
//! cross the cooperative tick boundary: handlers log them and report the
//! outcome through a response payload or an LED burst instead.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Credential namespace could not be opened, read, or committed.
    Storage(StorageError),
    /// Wi-Fi driver, AP bring-up, station, or mDNS failure.
    Radio(RadioError),
    /// Firmware update writer failure.
    Flash(FlashError),
    /// HTTP or WebSocket server could not be bound.
    Server(ServerError),
    /// BLE stack bring-up failure.
    Ble(BleError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Build-time configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Flash(e) => write!(f, "flash: {e}"),
            Self::Server(e) => write!(f, "server: {e}"),
            Self::Ble(e) => write!(f, "ble: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Radio errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Driver could not be created or its mode changed.
    DriverFailed,
    /// The soft-AP refused to start.
    ApStartFailed,
    /// Station configuration was rejected (SSID/password too long).
    InvalidCredentials,
    /// Station connect request was refused by the driver.
    StationFailed,
    /// Network scan failed.
    ScanFailed,
    /// mDNS responder could not be started or a service registered.
    MdnsFailed,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DriverFailed => write!(f, "Wi-Fi driver failure"),
            Self::ApStartFailed => write!(f, "soft-AP start failed"),
            Self::InvalidCredentials => write!(f, "station credentials rejected"),
            Self::StationFailed => write!(f, "station connect request failed"),
            Self::ScanFailed => write!(f, "network scan failed"),
            Self::MdnsFailed => write!(f, "mDNS registration failed"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Flash (update writer) errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// No inactive application partition to write into.
    NoPartition,
    /// The writer refused to open.
    BeginFailed,
    /// A chunk could not be appended.
    WriteFailed,
    /// Image verification failed on commit.
    VerifyFailed,
    /// The new image could not be selected for the next boot.
    BootSetFailed,
    /// Operation requires an open writer.
    NotOpen,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPartition => write!(f, "no inactive OTA partition available"),
            Self::BeginFailed => write!(f, "update begin failed"),
            Self::WriteFailed => write!(f, "update write failed"),
            Self::VerifyFailed => write!(f, "image verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::NotOpen => write!(f, "no update in progress"),
        }
    }
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Self::Flash(e)
    }
}

// ---------------------------------------------------------------------------
// Server errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerError {
    /// Listening socket could not be bound.
    BindFailed(u16),
    /// A URI handler could not be registered.
    HandlerFailed,
    /// Outbound data connection to an uploader was refused or timed out.
    ConnectFailed,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BindFailed(port) => write!(f, "could not bind port {port}"),
            Self::HandlerFailed => write!(f, "handler registration failed"),
            Self::ConnectFailed => write!(f, "could not connect back to uploader"),
        }
    }
}

impl From<ServerError> for Error {
    fn from(e: ServerError) -> Self {
        Self::Server(e)
    }
}

// ---------------------------------------------------------------------------
// BLE errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleError {
    /// Controller or Bluedroid host failed to initialise (raw esp_err_t).
    StackInitFailed(i32),
    /// GATT application could not be registered.
    RegisterFailed(i32),
}

impl fmt::Display for BleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackInitFailed(rc) => write!(f, "BLE stack init failed (rc={rc})"),
            Self::RegisterFailed(rc) => write!(f, "GATT app register failed (rc={rc})"),
        }
    }
}

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Self::Ble(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
