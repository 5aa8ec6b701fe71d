//! Process-wide device bundle.
//!
//! Built once in `main` from concrete adapters (or from mocks in the
//! integration tests), booted once, then handed to the
//! [`MainLoop`](crate::scheduler::MainLoop) for the rest of the power
//! cycle.  Nothing here is torn down except by a restart.

use log::{info, warn};

use crate::app::credentials::CredentialStore;
use crate::app::events::{AppEvent, EventQueue};
use crate::app::ports::{
    AdcPort, BlePort, ClockPort, EventSink, FlashWriterPort, HttpServerPort, LedPort, MdnsPort,
    NetUpdatePort, PartitionKind, RadioPort, SerialPort, StoragePort, SystemPort, WebSocketPort,
};
use crate::app::radio::{RadioBoot, RadioController};
use crate::app::sample::Sample;
use crate::config::{DefaultCredentials, FeatureFlags, FirmwareConfig, NUM_CHANNELS};
use crate::drivers::led_patterns::LedPatternEngine;

/// Serial banner printed after the start delay.
pub const BOOT_BANNER: &str = "[BOOT] ESP32-S3 starting up...";
/// Board identification line closing the boot dump.
pub const BOARD_LINE: &str = "ESP32-S3-Feather";
/// Wait for the host to open the USB serial port.
pub const SERIAL_START_DELAY_MS: u32 = 2_000;

/// Concrete collaborators, one per port.
pub struct Ports {
    pub clock: Box<dyn ClockPort>,
    pub system: Box<dyn SystemPort>,
    pub adc: Box<dyn AdcPort>,
    pub serial: Option<Box<dyn SerialPort>>,
    pub ws: Box<dyn WebSocketPort>,
    pub ble: Box<dyn BlePort>,
    pub http: Box<dyn HttpServerPort>,
    pub net_update: Box<dyn NetUpdatePort>,
    pub flash: Box<dyn FlashWriterPort>,
    pub led: Box<dyn LedPort>,
    pub storage: Box<dyn StoragePort>,
    pub radio: Box<dyn RadioPort>,
    pub mdns: Box<dyn MdnsPort>,
    pub sink: Box<dyn EventSink>,
}

pub struct Device {
    pub(crate) config: FirmwareConfig,
    pub(crate) features: FeatureFlags,
    pub(crate) defaults: DefaultCredentials,
    pub(crate) clock: Box<dyn ClockPort>,
    pub(crate) system: Box<dyn SystemPort>,
    pub(crate) adc: Box<dyn AdcPort>,
    pub(crate) serial: Option<Box<dyn SerialPort>>,
    pub(crate) ws: Box<dyn WebSocketPort>,
    pub(crate) ble: Box<dyn BlePort>,
    pub(crate) http: Box<dyn HttpServerPort>,
    pub(crate) net_update: Box<dyn NetUpdatePort>,
    pub(crate) flash: Box<dyn FlashWriterPort>,
    pub(crate) led: Box<dyn LedPort>,
    pub(crate) led_engine: LedPatternEngine,
    pub(crate) credentials: CredentialStore,
    pub(crate) radio: RadioController,
    pub(crate) events: EventQueue,
    pub(crate) sink: Box<dyn EventSink>,
    ble_ready: bool,
    booted: bool,
}

impl Device {
    pub fn new(
        config: FirmwareConfig,
        features: FeatureFlags,
        defaults: DefaultCredentials,
        ports: Ports,
    ) -> Self {
        let led_engine = LedPatternEngine::new(config.stream.led_fast_ms, config.stream.led_slow_ms);
        let radio = RadioController::new(ports.radio, ports.mdns, config.network.clone());
        Self {
            config,
            features,
            defaults,
            clock: ports.clock,
            system: ports.system,
            adc: ports.adc,
            serial: ports.serial,
            ws: ports.ws,
            ble: ports.ble,
            http: ports.http,
            net_update: ports.net_update,
            flash: ports.flash,
            led: ports.led,
            led_engine,
            credentials: CredentialStore::new(ports.storage),
            radio,
            events: EventQueue::new(),
            sink: ports.sink,
            ble_ready: false,
            booted: false,
        }
    }

    pub fn config(&self) -> &FirmwareConfig {
        &self.config
    }

    pub fn features(&self) -> FeatureFlags {
        self.features
    }

    pub fn radio(&self) -> &RadioController {
        &self.radio
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn ble_ready(&self) -> bool {
        self.ble_ready
    }

    pub fn is_booted(&self) -> bool {
        self.booted
    }

    /// One-shot bring-up.  A second call is ignored.
    pub fn boot(&mut self) {
        if self.booted {
            return;
        }
        self.booted = true;

        if self.features.serial {
            self.clock.delay_ms(SERIAL_START_DELAY_MS);
            self.dump_boot_info();
        }
        info!(
            "Boot: cardinal-grip v{} (serial={} wifi={} ble={} led={})",
            env!("CARGO_PKG_VERSION"),
            self.features.serial,
            self.features.wifi,
            self.features.ble,
            self.features.status_led
        );

        self.system.mark_running_image_valid();
        self.led_engine.set_sampling(true);

        if self.features.ble {
            match self.ble.init(&self.config.ble) {
                Ok(()) => {
                    self.ble_ready = true;
                    self.events.push(AppEvent::BleReady);
                }
                Err(e) => warn!("Boot: BLE disabled this boot: {e}"),
            }
        }

        if self.features.wifi {
            self.radio.initialize(RadioBoot {
                credentials: &self.credentials,
                defaults: &self.defaults,
                clock: self.clock.as_mut(),
                http: self.http.as_mut(),
                ws: self.ws.as_mut(),
                net_update: self.net_update.as_mut(),
                events: &mut self.events,
            });
        }

        self.events.push(AppEvent::Booted {
            wifi: self.radio.is_ready(),
            ble: self.ble_ready,
        });
    }

    fn dump_boot_info(&mut self) {
        let Some(serial) = self.serial.as_mut() else {
            return;
        };
        serial.write_line("");
        serial.write_line(BOOT_BANNER);

        let partitions = self.system.partitions();
        for (title, kind) in [
            ("===== App partitions =====", PartitionKind::App),
            ("===== Data partitions =====", PartitionKind::Data),
        ] {
            serial.write_line(title);
            for p in partitions.iter().filter(|p| p.kind == kind) {
                let line = format!(
                    "  label={} type={} subtype={} addr=0x{:06x} size={} bytes",
                    p.label, kind as u8, p.subtype, p.address, p.size
                );
                serial.write_line(&line);
            }
        }
        serial.write_line("");
        serial.write_line(BOARD_LINE);
    }

    /// Read every channel once.
    pub fn capture(&mut self) -> Sample {
        let now = self.clock.now_ms();
        let mut raw = [0u16; NUM_CHANNELS];
        for (ch, slot) in raw.iter_mut().enumerate() {
            *slot = self.adc.read(ch);
        }
        Sample::new(now, raw)
    }
}
