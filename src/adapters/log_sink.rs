//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per application
//! event to the ESP-IDF logger (UART / USB-CDC in production).  Sample
//! lines never pass through here; they go to the serial port bare.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Booted { wifi, ble } => {
                info!("BOOT  | done | wifi={} ble={}", wifi, ble);
            }
            AppEvent::RadioReady => info!("RADIO | ready"),
            AppEvent::RadioDead => warn!("RADIO | AP failed, networking off this boot"),
            AppEvent::StationConnected { ssid } => info!("RADIO | station up on '{}'", ssid),
            AppEvent::StationTimedOut => warn!("RADIO | station timed out"),
            AppEvent::BleReady => info!("BLE   | advertising"),
            AppEvent::BleConnected => info!("BLE   | central connected"),
            AppEvent::BleDisconnected => info!("BLE   | central disconnected"),
            AppEvent::CredentialsSaved { ssid } => info!("CREDS | saved '{}'", ssid),
            AppEvent::CredentialsCleared => info!("CREDS | cleared"),
            AppEvent::OtaStarted { max_size } => info!("OTA   | start, region {} bytes", max_size),
            AppEvent::OtaSucceeded { bytes } => info!("OTA   | ok, {} bytes", bytes),
            AppEvent::OtaFailed => warn!("OTA   | failed"),
            AppEvent::RebootScheduled { in_ms } => info!("SYS   | reboot in {} ms", in_ms),
        }
    }
}
