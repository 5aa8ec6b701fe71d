//! Radio bring-up and status.
//!
//! The soft-AP always comes up first and stays up for the whole boot.  A
//! station attempt is made once, best-effort, with the highest-precedence
//! credentials; there is no retry loop.  Provisioning changes take effect
//! through a restart.

use std::net::Ipv4Addr;

use log::{info, warn};

use crate::app::credentials::{CredentialStore, choose_station_credentials};
use crate::app::events::{AppEvent, EventQueue};
use crate::app::ports::{
    ClockPort, HttpServerPort, MdnsPort, MdnsService, NetUpdatePort, RadioMode, RadioPort,
    ScanEntry, StationStatus, WebSocketPort,
};
use crate::config::{DefaultCredentials, NetworkConfig};

/// Controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// `initialize` not run yet (or Wi-Fi feature off).
    Uninitialized,
    /// AP bring-up failed; networking is off this boot.
    Dead,
    /// AP up and servers started.
    Ready,
}

/// Boot-time station outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationOutcome {
    NotAttempted,
    Connected,
    TimedOut,
}

/// Point-in-time radio status, as reported by the status API and portal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioStatus {
    pub mode: RadioMode,
    pub sta_connected: bool,
    pub sta_ssid: Option<String>,
    pub sta_ip: Option<Ipv4Addr>,
    pub ap_ssid: Option<String>,
    pub ap_ip: Option<Ipv4Addr>,
}

/// Services advertised once the station is on the LAN.  `_arduino` points
/// upload tools at the espota listener.
pub fn mdns_services(network: &NetworkConfig) -> [MdnsService; 3] {
    [
        MdnsService {
            service: "_http",
            proto: "_tcp",
            port: network.http_port,
        },
        MdnsService {
            service: "_ws",
            proto: "_tcp",
            port: network.ws_port,
        },
        MdnsService {
            service: "_arduino",
            proto: "_tcp",
            port: network.ota_port,
        },
    ]
}

pub struct RadioController {
    radio: Box<dyn RadioPort>,
    mdns: Box<dyn MdnsPort>,
    network: NetworkConfig,
    state: RadioState,
    station: StationOutcome,
}

/// Everything `initialize` touches besides the controller's own ports.
pub struct RadioBoot<'a> {
    pub credentials: &'a CredentialStore,
    pub defaults: &'a DefaultCredentials,
    pub clock: &'a mut dyn ClockPort,
    pub http: &'a mut dyn HttpServerPort,
    pub ws: &'a mut dyn WebSocketPort,
    pub net_update: &'a mut dyn NetUpdatePort,
    pub events: &'a mut EventQueue,
}

impl RadioController {
    pub fn new(radio: Box<dyn RadioPort>, mdns: Box<dyn MdnsPort>, network: NetworkConfig) -> Self {
        Self {
            radio,
            mdns,
            network,
            state: RadioState::Uninitialized,
            station: StationOutcome::NotAttempted,
        }
    }

    pub fn state(&self) -> RadioState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == RadioState::Ready
    }

    pub fn station_outcome(&self) -> StationOutcome {
        self.station
    }

    /// Boot sequence: reset, AP, station attempt, mDNS, servers.
    pub fn initialize(&mut self, boot: RadioBoot<'_>) {
        if let Err(e) = self.radio.reset() {
            warn!("Radio: reset failed: {e}");
        }

        if let Err(e) = self.radio.start_ap(&self.network) {
            warn!("Radio: {e}; networking disabled this boot");
            self.state = RadioState::Dead;
            boot.events.push(AppEvent::RadioDead);
            return;
        }
        boot.clock.delay_ms(self.network.ap_settle_ms);
        match self.radio.ap_ip() {
            Some(ip) => info!("Radio: AP '{}' up at {ip}", self.network.ap_ssid),
            None => info!("Radio: AP '{}' up (no address yet)", self.network.ap_ssid),
        }

        self.station = match choose_station_credentials(boot.credentials.load(), boot.defaults) {
            Some((creds, source)) => {
                info!(
                    "Radio: connecting to '{}' ({} credentials)",
                    creds.ssid,
                    source.as_str()
                );
                self.connect_station(&creds.ssid, &creds.password, boot.clock)
            }
            None => {
                info!("Radio: no station credentials, AP only");
                StationOutcome::NotAttempted
            }
        };
        match self.station {
            StationOutcome::Connected => {
                let ssid = self.radio.station_ssid().unwrap_or_default();
                boot.events.push(AppEvent::StationConnected { ssid });
                self.start_mdns();
            }
            StationOutcome::TimedOut => boot.events.push(AppEvent::StationTimedOut),
            StationOutcome::NotAttempted => {}
        }

        if let Err(e) = boot.http.start(self.network.http_port) {
            warn!("Radio: HTTP server: {e}");
        }
        if let Err(e) = boot.ws.start(self.network.ws_port) {
            warn!("Radio: WebSocket server: {e}");
        }
        if let Err(e) = boot.net_update.start(self.network.ota_port) {
            warn!("Radio: network upload listener: {e}");
        }

        self.state = RadioState::Ready;
        boot.events.push(AppEvent::RadioReady);
    }

    /// Begin the station connect and poll until connected or the timeout.
    fn connect_station(
        &mut self,
        ssid: &str,
        password: &str,
        clock: &mut dyn ClockPort,
    ) -> StationOutcome {
        if let Err(e) = self.radio.begin_station(ssid, password) {
            warn!("Radio: station begin failed: {e}");
            return StationOutcome::TimedOut;
        }

        let start = clock.now_ms();
        loop {
            if self.radio.station_status() == StationStatus::Connected {
                match self.radio.station_ip() {
                    Some(ip) => info!("Radio: station connected, IP {ip}"),
                    None => info!("Radio: station connected"),
                }
                return StationOutcome::Connected;
            }
            if clock.now_ms().wrapping_sub(start) >= self.network.sta_timeout_ms {
                warn!(
                    "Radio: station '{ssid}' not connected after {} ms",
                    self.network.sta_timeout_ms
                );
                return StationOutcome::TimedOut;
            }
            clock.delay_ms(self.network.sta_poll_ms);
        }
    }

    fn start_mdns(&mut self) {
        let services = mdns_services(&self.network);
        match self
            .mdns
            .start(&self.network.hostname, "Cardinal Grip", &services)
        {
            Ok(()) => info!("Radio: mDNS '{}.local' registered", self.network.hostname),
            Err(e) => warn!("Radio: {e}"),
        }
    }

    /// Snapshot for the status API and portal.
    pub fn status(&mut self) -> RadioStatus {
        let mode = self.radio.mode();
        let sta_connected =
            mode.has_station() && self.radio.station_status() == StationStatus::Connected;
        let (sta_ssid, sta_ip) = if sta_connected {
            (self.radio.station_ssid(), self.radio.station_ip())
        } else {
            (None, None)
        };
        let ap_on = mode.has_ap() && self.state != RadioState::Dead;
        let (ap_ssid, ap_ip) = if ap_on {
            (Some(self.network.ap_ssid.clone()), self.radio.ap_ip())
        } else {
            (None, None)
        };
        RadioStatus {
            mode,
            sta_connected,
            sta_ssid,
            sta_ip,
            ap_ssid,
            ap_ip,
        }
    }

    /// Visible networks.  A failed scan is reported as an empty list.
    pub fn scan(&mut self) -> Vec<ScanEntry> {
        match self.radio.scan() {
            Ok(list) => list,
            Err(e) => {
                warn!("Radio: {e}");
                Vec::new()
            }
        }
    }
}
