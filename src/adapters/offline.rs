//! Stand-ins for collaborators whose driver failed to come up.
//!
//! `main` plugs these in when NVS or the Wi-Fi driver cannot be created,
//! so the device still boots into serial/BLE sampling instead of halting.
//! Both are plain Rust and behave identically on every target.

use std::net::Ipv4Addr;

use log::debug;

use crate::app::ports::{RadioMode, RadioPort, ScanEntry, StationStatus, StorageError, StoragePort};
use crate::config::NetworkConfig;
use crate::error::RadioError;

/// Storage with nothing behind it: reads find nothing, writes fail.
#[derive(Debug, Default)]
pub struct OfflineStorage;

impl OfflineStorage {
    pub fn new() -> Self {
        Self
    }
}

impl StoragePort for OfflineStorage {
    fn get_str(&self, _namespace: &str, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set_strs(&mut self, namespace: &str, _entries: &[(&str, &str)]) -> Result<(), StorageError> {
        debug!("Storage(offline): write to '{namespace}' refused");
        Err(StorageError::IoError)
    }

    fn erase_namespace(&mut self, _namespace: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Radio without a driver.  The AP never starts, so the radio controller
/// marks networking dead and no server is brought up.
#[derive(Debug, Default)]
pub struct OfflineRadio;

impl OfflineRadio {
    pub fn new() -> Self {
        Self
    }
}

impl RadioPort for OfflineRadio {
    fn reset(&mut self) -> Result<(), RadioError> {
        Err(RadioError::DriverFailed)
    }

    fn start_ap(&mut self, _network: &NetworkConfig) -> Result<(), RadioError> {
        Err(RadioError::DriverFailed)
    }

    fn begin_station(&mut self, _ssid: &str, _password: &str) -> Result<(), RadioError> {
        Err(RadioError::DriverFailed)
    }

    fn station_status(&mut self) -> StationStatus {
        StationStatus::Idle
    }

    fn mode(&self) -> RadioMode {
        RadioMode::Off
    }

    fn station_ssid(&self) -> Option<String> {
        None
    }

    fn station_ip(&self) -> Option<Ipv4Addr> {
        None
    }

    fn ap_ip(&self) -> Option<Ipv4Addr> {
        None
    }

    fn scan(&mut self) -> Result<Vec<ScanEntry>, RadioError> {
        Err(RadioError::ScanFailed)
    }
}
