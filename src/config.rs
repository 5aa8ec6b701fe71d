//! Firmware configuration parameters.
//!
//! Everything here is fixed at build time.  Wi-Fi station credentials are
//! the one runtime-mutable setting and live in NVS (see
//! [`CredentialStore`](crate::app::credentials::CredentialStore)); the
//! values below only provide the compile-time fallback for them.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of FSR channels sampled per tick.
pub const NUM_CHANNELS: usize = 4;

/// Template SSID shipped in the credential header; never used for a
/// station attempt.
pub const WIFI_PLACEHOLDER_SSID: &str = "YOUR_WIFI_SSID_HERE";
pub const WIFI_PLACEHOLDER_PASSWORD: &str = "YOUR_WIFI_PASSWORD_HERE";

// ---------------------------------------------------------------------------
// Feature toggles
// ---------------------------------------------------------------------------

/// Compile-time transport/peripheral toggles.  Strictly additive: a
/// disabled feature skips both its initialisation and its per-sample work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    pub serial: bool,
    pub wifi: bool,
    pub ble: bool,
    pub status_led: bool,
}

impl FeatureFlags {
    /// Flags selected by the cargo features this image was built with.
    pub const fn from_build() -> Self {
        Self {
            serial: cfg!(feature = "serial"),
            wifi: cfg!(feature = "wifi"),
            ble: cfg!(feature = "ble"),
            status_led: cfg!(feature = "status-led"),
        }
    }

    pub const fn all() -> Self {
        Self {
            serial: true,
            wifi: true,
            ble: true,
            status_led: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Compile-time station credentials
// ---------------------------------------------------------------------------

/// Development fallback credentials, injected with
/// `CG_WIFI_SSID=... CG_WIFI_PASSWORD=... cargo build`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultCredentials {
    pub ssid: &'static str,
    pub password: &'static str,
}

impl DefaultCredentials {
    pub const fn from_build() -> Self {
        Self {
            ssid: match option_env!("CG_WIFI_SSID") {
                Some(s) => s,
                None => WIFI_PLACEHOLDER_SSID,
            },
            password: match option_env!("CG_WIFI_PASSWORD") {
                Some(p) => p,
                None => WIFI_PLACEHOLDER_PASSWORD,
            },
        }
    }

    /// Usable only when set and not the template value.
    pub fn is_usable(&self) -> bool {
        !self.ssid.is_empty() && self.ssid != WIFI_PLACEHOLDER_SSID
    }
}

// ---------------------------------------------------------------------------
// Configuration groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Soft-AP SSID, always broadcast.
    pub ap_ssid: String,
    /// Soft-AP WPA2 passphrase (8+ chars).
    pub ap_password: String,
    pub ap_channel: u8,
    pub ap_max_clients: u8,
    /// Wait after AP start before reading its address.
    pub ap_settle_ms: u32,
    /// Hard cap on the boot-time station connect wait.
    pub sta_timeout_ms: u32,
    /// Station status poll period during that wait.
    pub sta_poll_ms: u32,
    /// mDNS host label (`<hostname>.local`).
    pub hostname: String,
    pub http_port: u16,
    pub ws_port: u16,
    /// Advertised over mDNS for legacy network-upload tooling.
    pub ota_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Minimum spacing between samples (floor, not ceiling).
    pub sample_interval_ms: u32,
    /// LED toggle period while sampling.
    pub led_fast_ms: u32,
    /// LED toggle period otherwise.
    pub led_slow_ms: u32,
    /// Cooperative yield at the end of every tick.
    pub yield_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleConfig {
    pub device_name: String,
    /// Settle delay before re-advertising after a central drops.
    pub settle_ms: u32,
    /// Preferred connection interval range, 1.25 ms units.
    pub min_preferred: u16,
    pub max_preferred: u16,
}

/// Grace periods between a committed response and the restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebootConfig {
    pub portal_grace_ms: u32,
    pub api_grace_ms: u32,
    pub update_grace_ms: u32,
}

/// Complete firmware configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareConfig {
    pub network: NetworkConfig,
    pub stream: StreamConfig,
    pub ble: BleConfig,
    pub reboot: RebootConfig,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                ap_ssid: "CardinalGrip_AP".into(),
                ap_password: "SqueezyPeasy1".into(),
                ap_channel: 1,
                ap_max_clients: 4,
                ap_settle_ms: 300,
                sta_timeout_ms: 8_000,
                sta_poll_ms: 250,
                hostname: "cardinal-grip".into(),
                http_port: 80,
                ws_port: 81,
                ota_port: 3232,
            },
            stream: StreamConfig {
                sample_interval_ms: 10, // ~100 Hz
                led_fast_ms: 200,
                led_slow_ms: 800,
                yield_ms: 1,
            },
            ble: BleConfig {
                device_name: "CardinalGrip_S3".into(),
                settle_ms: 500,
                min_preferred: 0x06,
                max_preferred: 0x12,
            },
            reboot: RebootConfig {
                portal_grace_ms: 1_000,
                api_grace_ms: 800,
                update_grace_ms: 1_000,
            },
        }
    }
}

impl FirmwareConfig {
    /// Reject values the radio or the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        let net = &self.network;
        if net.ap_ssid.is_empty() || net.ap_ssid.len() > 32 {
            return Err(Error::Config("ap_ssid must be 1-32 bytes"));
        }
        if net.ap_password.len() < 8 || net.ap_password.len() > 64 {
            return Err(Error::Config("ap_password must be 8-64 bytes"));
        }
        if !(1..=13).contains(&net.ap_channel) {
            return Err(Error::Config("ap_channel must be 1-13"));
        }
        if net.ap_max_clients == 0 {
            return Err(Error::Config("ap_max_clients must be > 0"));
        }
        if net.sta_poll_ms == 0 || net.sta_poll_ms > net.sta_timeout_ms {
            return Err(Error::Config("sta_poll_ms must be in 1..=sta_timeout_ms"));
        }
        if self.stream.sample_interval_ms == 0 {
            return Err(Error::Config("sample_interval_ms must be > 0"));
        }
        if self.stream.led_fast_ms == 0 || self.stream.led_slow_ms == 0 {
            return Err(Error::Config("LED intervals must be > 0"));
        }
        Ok(())
    }
}
