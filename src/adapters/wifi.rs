//! Wi-Fi adapter (combined soft-AP + station).
//!
//! Implements [`RadioPort`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi` over
//!   `EspWifi`, created without an NVS partition so the driver never
//!   persists its own configuration.  A raw event handler feeds the
//!   [`events`](crate::events) ring.
//! - **all other targets**: simulation.  The AP comes up, the station
//!   never associates (there is no LAN), and scans return a fixed list.

use std::net::Ipv4Addr;

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{RadioMode, RadioPort, ScanEntry, StationStatus};
use crate::config::NetworkConfig;
use crate::error::RadioError;
use crate::events::{self, RadioEvent};

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
        EspWifi,
    },
};

/// Map a driver event id to the ring's code.
#[cfg(target_os = "espidf")]
fn classify_wifi_event(id: u32) -> RadioEvent {
    use esp_idf_svc::sys::*;

    #[allow(non_upper_case_globals)]
    match id {
        wifi_event_t_WIFI_EVENT_AP_START => RadioEvent::ApStarted,
        wifi_event_t_WIFI_EVENT_AP_STOP => RadioEvent::ApStopped,
        wifi_event_t_WIFI_EVENT_AP_STACONNECTED => RadioEvent::ApClientJoined,
        wifi_event_t_WIFI_EVENT_AP_STADISCONNECTED => RadioEvent::ApClientLeft,
        wifi_event_t_WIFI_EVENT_AP_PROBEREQRECVED => RadioEvent::ApProbeRequest,
        wifi_event_t_WIFI_EVENT_STA_START => RadioEvent::StaStarted,
        wifi_event_t_WIFI_EVENT_STA_CONNECTED => RadioEvent::StaConnected,
        wifi_event_t_WIFI_EVENT_STA_DISCONNECTED => RadioEvent::StaDisconnected,
        wifi_event_t_WIFI_EVENT_SCAN_DONE => RadioEvent::ScanDone,
        _ => RadioEvent::Other,
    }
}

/// Runs on the system event task.  Only touches the lock-free ring.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn radio_event_handler(
    _arg: *mut core::ffi::c_void,
    base: esp_idf_svc::sys::esp_event_base_t,
    id: i32,
    _data: *mut core::ffi::c_void,
) {
    use esp_idf_svc::sys::*;

    // SAFETY: the event bases are immutable statics exported by ESP-IDF.
    let event = unsafe {
        if base == WIFI_EVENT {
            classify_wifi_event(id as u32)
        } else if base == IP_EVENT && id as u32 == ip_event_t_IP_EVENT_STA_GOT_IP {
            RadioEvent::StaGotIp
        } else {
            return;
        }
    };
    events::push_event(event);
}

#[cfg(target_os = "espidf")]
fn register_event_handlers() -> Result<(), RadioError> {
    use esp_idf_svc::sys::*;

    // SAFETY: the handler is a plain `extern "C"` fn with no captured state
    // and stays registered for the lifetime of the firmware.
    let rc = unsafe {
        esp_event_handler_register(
            WIFI_EVENT,
            ESP_EVENT_ANY_ID,
            Some(radio_event_handler),
            core::ptr::null_mut(),
        )
    };
    if rc != ESP_OK as i32 {
        warn!("Radio: WIFI_EVENT handler register failed ({})", rc);
        return Err(RadioError::DriverFailed);
    }
    // SAFETY: as above.
    let rc = unsafe {
        esp_event_handler_register(
            IP_EVENT,
            ip_event_t_IP_EVENT_STA_GOT_IP as i32,
            Some(radio_event_handler),
            core::ptr::null_mut(),
        )
    };
    if rc != ESP_OK as i32 {
        warn!("Radio: IP_EVENT handler register failed ({})", rc);
        return Err(RadioError::DriverFailed);
    }
    Ok(())
}

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(target_os = "espidf")]
    ap: AccessPointConfiguration,
    #[cfg(not(target_os = "espidf"))]
    mode: RadioMode,
    #[cfg(not(target_os = "espidf"))]
    ap_up: bool,
    station_attempted: bool,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    /// Take the modem and initialise the driver with RAM-only storage.
    pub fn new(modem: Modem, sysloop: EspSystemEventLoop) -> Result<Self, RadioError> {
        let driver = EspWifi::new(modem, sysloop.clone(), None).map_err(|e| {
            warn!("Radio: EspWifi::new failed: {:?}", e);
            RadioError::DriverFailed
        })?;
        let wifi = BlockingWifi::wrap(driver, sysloop).map_err(|e| {
            warn!("Radio: BlockingWifi::wrap failed: {:?}", e);
            RadioError::DriverFailed
        })?;
        register_event_handlers()?;
        Ok(Self {
            wifi,
            ap: AccessPointConfiguration::default(),
            station_attempted: false,
        })
    }

    fn raw_mode() -> RadioMode {
        use esp_idf_svc::sys::*;

        let mut mode: wifi_mode_t = wifi_mode_t_WIFI_MODE_NULL;
        // SAFETY: out-pointer to a local.
        if unsafe { esp_wifi_get_mode(&mut mode) } != ESP_OK as i32 {
            return RadioMode::Off;
        }
        #[allow(non_upper_case_globals)]
        match mode {
            wifi_mode_t_WIFI_MODE_STA => RadioMode::Station,
            wifi_mode_t_WIFI_MODE_AP => RadioMode::AccessPoint,
            wifi_mode_t_WIFI_MODE_APSTA => RadioMode::ApStation,
            _ => RadioMode::Off,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            mode: RadioMode::Off,
            ap_up: false,
            station_attempted: false,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioPort for WifiAdapter {
    #[cfg(target_os = "espidf")]
    fn reset(&mut self) -> Result<(), RadioError> {
        use esp_idf_svc::sys::*;

        // SAFETY: the driver is initialised by EspWifi::new.
        let rc = unsafe { esp_wifi_set_storage(wifi_storage_t_WIFI_STORAGE_RAM) };
        if rc != ESP_OK as i32 {
            warn!("Radio: set_storage(RAM) failed ({})", rc);
            return Err(RadioError::DriverFailed);
        }
        // Not associated yet on a cold boot; the error is expected.
        let _ = self.wifi.wifi_mut().disconnect();
        // SAFETY: as above.
        let rc = unsafe { esp_wifi_set_mode(wifi_mode_t_WIFI_MODE_APSTA) };
        if rc != ESP_OK as i32 {
            warn!("Radio: set_mode(APSTA) failed ({})", rc);
            return Err(RadioError::DriverFailed);
        }
        self.station_attempted = false;
        info!("Radio: driver reset, mode AP+STA");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn reset(&mut self) -> Result<(), RadioError> {
        self.mode = RadioMode::ApStation;
        self.ap_up = false;
        self.station_attempted = false;
        info!("Radio(sim): driver reset, mode AP+STA");
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn start_ap(&mut self, network: &NetworkConfig) -> Result<(), RadioError> {
        let ap = AccessPointConfiguration {
            ssid: network
                .ap_ssid
                .as_str()
                .try_into()
                .map_err(|_| RadioError::ApStartFailed)?,
            password: network
                .ap_password
                .as_str()
                .try_into()
                .map_err(|_| RadioError::ApStartFailed)?,
            auth_method: if network.ap_password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            channel: network.ap_channel,
            max_connections: u16::from(network.ap_max_clients),
            ssid_hidden: false,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Mixed(
                ClientConfiguration::default(),
                ap.clone(),
            ))
            .map_err(|e| {
                warn!("Radio: AP configuration rejected: {:?}", e);
                RadioError::ApStartFailed
            })?;
        self.wifi.start().map_err(|e| {
            warn!("Radio: driver start failed: {:?}", e);
            RadioError::ApStartFailed
        })?;
        self.ap = ap;
        info!(
            "Radio: AP '{}' up on channel {} (max {} clients)",
            network.ap_ssid, network.ap_channel, network.ap_max_clients
        );
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn start_ap(&mut self, network: &NetworkConfig) -> Result<(), RadioError> {
        if network.ap_ssid.is_empty() || network.ap_ssid.len() > 32 {
            return Err(RadioError::ApStartFailed);
        }
        self.ap_up = true;
        events::push_event(RadioEvent::ApStarted);
        info!(
            "Radio(sim): AP '{}' up on channel {}",
            network.ap_ssid, network.ap_channel
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn begin_station(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        let client = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| RadioError::InvalidCredentials)?,
            password: password
                .try_into()
                .map_err(|_| RadioError::InvalidCredentials)?,
            auth_method: if password.is_empty() {
                AuthMethod::None
            } else {
                // Weakest accepted mode; WPA2/WPA3 networks still match.
                AuthMethod::WPAPersonal
            },
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Mixed(client, self.ap.clone()))
            .map_err(|e| {
                warn!("Radio: station configuration rejected: {:?}", e);
                RadioError::StationFailed
            })?;
        self.wifi.wifi_mut().connect().map_err(|e| {
            warn!("Radio: station connect failed: {:?}", e);
            RadioError::StationFailed
        })?;
        self.station_attempted = true;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn begin_station(&mut self, ssid: &str, _password: &str) -> Result<(), RadioError> {
        if ssid.is_empty() || ssid.len() > 32 {
            return Err(RadioError::InvalidCredentials);
        }
        self.station_attempted = true;
        events::push_event(RadioEvent::StaStarted);
        info!("Radio(sim): station connecting to '{}'", ssid);
        Ok(())
    }

    fn station_status(&mut self) -> StationStatus {
        if !self.station_attempted {
            return StationStatus::Idle;
        }
        if self.station_ip().is_some() {
            StationStatus::Connected
        } else {
            StationStatus::Connecting
        }
    }

    #[cfg(target_os = "espidf")]
    fn mode(&self) -> RadioMode {
        Self::raw_mode()
    }

    #[cfg(not(target_os = "espidf"))]
    fn mode(&self) -> RadioMode {
        self.mode
    }

    #[cfg(target_os = "espidf")]
    fn station_ssid(&self) -> Option<String> {
        self.station_ip()?;
        match self.wifi.get_configuration().ok()? {
            Configuration::Client(c) | Configuration::Mixed(c, _) => Some(c.ssid.as_str().into()),
            _ => None,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn station_ssid(&self) -> Option<String> {
        None
    }

    #[cfg(target_os = "espidf")]
    fn station_ip(&self) -> Option<Ipv4Addr> {
        if !self.wifi.is_connected().unwrap_or(false) {
            return None;
        }
        let info = self.wifi.wifi().sta_netif().get_ip_info().ok()?;
        (!info.ip.is_unspecified()).then_some(info.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn station_ip(&self) -> Option<Ipv4Addr> {
        None
    }

    #[cfg(target_os = "espidf")]
    fn ap_ip(&self) -> Option<Ipv4Addr> {
        if !Self::raw_mode().has_ap() {
            return None;
        }
        self.wifi.wifi().ap_netif().get_ip_info().ok().map(|i| i.ip)
    }

    #[cfg(not(target_os = "espidf"))]
    fn ap_ip(&self) -> Option<Ipv4Addr> {
        self.ap_up.then_some(Ipv4Addr::new(192, 168, 4, 1))
    }

    #[cfg(target_os = "espidf")]
    fn scan(&mut self) -> Result<Vec<ScanEntry>, RadioError> {
        let found = self.wifi.scan().map_err(|e| {
            warn!("Radio: scan failed: {:?}", e);
            RadioError::ScanFailed
        })?;
        Ok(found
            .into_iter()
            .map(|ap| ScanEntry {
                ssid: ap.ssid.as_str().into(),
                rssi: ap.signal_strength,
                secure: !matches!(ap.auth_method, None | Some(AuthMethod::None)),
            })
            .collect())
    }

    #[cfg(not(target_os = "espidf"))]
    fn scan(&mut self) -> Result<Vec<ScanEntry>, RadioError> {
        if self.mode == RadioMode::Off {
            return Err(RadioError::ScanFailed);
        }
        events::push_event(RadioEvent::ScanDone);
        Ok(vec![
            ScanEntry {
                ssid: "SimHome".into(),
                rssi: -48,
                secure: true,
            },
            ScanEntry {
                ssid: "SimCafe".into(),
                rssi: -71,
                secure: false,
            },
        ])
    }
}
