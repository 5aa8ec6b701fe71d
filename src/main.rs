//! Cardinal Grip firmware — main entry point.
//!
//! Hexagonal architecture around a single cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  FsrAdc        StatusLed      NvsAdapter     Esp32Clock        │
//! │  (AdcPort)     (LedPort)      (StoragePort)  (ClockPort)       │
//! │  WifiAdapter   MdnsAdapter    BleAdapter     StdoutSerial      │
//! │  (RadioPort)   (MdnsPort)     (BlePort)      (SerialPort)      │
//! │  TinyHttpServer  WsServer     EspFlashWriter EspSystem         │
//! │  EspotaListener  OfflineRadio OfflineStorage                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  Device: credentials · radio · fanout · provisioning   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  MainLoop (ws → ble → http/ota/espota → led → sample → yield)  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::PinDriver;
use esp_idf_svc::hal::peripherals::Peripherals;
use log::{info, warn};

use cardinal_grip::adapters::ble::BleAdapter;
use cardinal_grip::adapters::espota::EspotaListener;
use cardinal_grip::adapters::flash::EspFlashWriter;
use cardinal_grip::adapters::hardware::FsrAdc;
use cardinal_grip::adapters::http_server::TinyHttpServer;
use cardinal_grip::adapters::log_sink::LogEventSink;
use cardinal_grip::adapters::mdns::MdnsAdapter;
use cardinal_grip::adapters::nvs::NvsAdapter;
use cardinal_grip::adapters::offline::{OfflineRadio, OfflineStorage};
use cardinal_grip::adapters::serial::StdoutSerial;
use cardinal_grip::adapters::system::EspSystem;
use cardinal_grip::adapters::time::Esp32Clock;
use cardinal_grip::adapters::websocket::WsServer;
use cardinal_grip::adapters::wifi::WifiAdapter;
use cardinal_grip::app::ports::{ClockPort, RadioPort, SerialPort, StoragePort};
use cardinal_grip::config::{DefaultCredentials, FeatureFlags, FirmwareConfig};
use cardinal_grip::device::{Device, Ports};
use cardinal_grip::drivers::{hw_init, status_led::StatusLed};
use cardinal_grip::error::Error;
use cardinal_grip::scheduler::MainLoop;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Cardinal Grip v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = FirmwareConfig::default();
    config.validate()?;
    let features = FeatureFlags::from_build();
    let defaults = DefaultCredentials::from_build();

    // ── 2. Peripherals ────────────────────────────────────────
    hw_init::init_peripherals().map_err(Error::from)?;
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let led_pin = PinDriver::output(peripherals.pins.gpio13)?;

    // NVS must be up before the Wi-Fi driver reads its calibration data.
    // Either failing costs networking, never sampling.
    let storage: Box<dyn StoragePort> = match NvsAdapter::new() {
        Ok(nvs) => Box::new(nvs),
        Err(e) => {
            warn!("NVS unavailable ({e}); credentials will not persist this boot");
            Box::new(OfflineStorage::new())
        }
    };
    let radio: Box<dyn RadioPort> = if features.wifi {
        match WifiAdapter::new(peripherals.modem, sysloop) {
            Ok(wifi) => Box::new(wifi),
            Err(e) => {
                warn!("Wi-Fi driver unavailable ({e}); continuing without networking");
                Box::new(OfflineRadio::new())
            }
        }
    } else {
        Box::new(OfflineRadio::new())
    };

    // ── 3. Device bundle ──────────────────────────────────────
    let serial: Option<Box<dyn SerialPort>> = if features.serial {
        Some(Box::new(StdoutSerial::new()))
    } else {
        None
    };
    let ports = Ports {
        clock: Box::new(Esp32Clock::new()),
        system: Box::new(EspSystem::new()),
        adc: Box::new(FsrAdc::new()),
        serial,
        ws: Box::new(WsServer::new()),
        ble: Box::new(BleAdapter::new()),
        http: Box::new(TinyHttpServer::new()),
        net_update: Box::new(EspotaListener::new()),
        flash: Box::new(EspFlashWriter::new()),
        led: Box::new(StatusLed::new(led_pin)),
        storage,
        radio,
        mdns: Box::new(MdnsAdapter::new()),
        sink: Box::new(LogEventSink::new()),
    };
    let mut device = Device::new(config, features, defaults, ports);

    // ── 4. Boot and run ───────────────────────────────────────
    device.boot();
    let clock = Esp32Clock::new();
    let mut main_loop = MainLoop::new(clock.now_ms());
    info!("System ready. Entering main loop.");

    loop {
        main_loop.tick(&mut device);
    }
}
