//! Cooperative main loop.
//!
//! One tick services every collaborator in a fixed order and samples when
//! the interval has elapsed.  Nothing in a tick blocks for long except a
//! firmware upload, which streams inside the HTTP or espota step.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ tick                                                         │
//! │  1. WebSocket service      (drain inbound frames)            │
//! │  2. BLE reconnect edge     (settle + re-advertise once)      │
//! │  3. HTTP/OTA (≤1 request), espota invitation, radio ring     │
//! │  4. app events → sink, LED bursts; LED heartbeat             │
//! │  5. sample + fanout        (every sample_interval_ms)        │
//! │  6. yield                                                    │
//! │  7. restart once a scheduled reboot deadline has passed      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use log::{debug, info};

use crate::app::ble_link::BleLink;
use crate::app::espota::serve_invitation;
use crate::app::events::AppEvent;
use crate::app::fanout::{Transports, fan_out};
use crate::app::http::PostAction;
use crate::app::ota::UploadOutcome;
use crate::app::ports::{BlePort, SerialPort, WebSocketPort};
use crate::app::provisioning::Provisioning;
use crate::device::Device;
use crate::events;

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub sampled: bool,
    /// Transports that carried the sample.
    pub transports: u8,
    pub readvertised: bool,
    pub restarted: bool,
}

/// `true` once `now` is at or past `deadline` on the wrapping ms clock.
pub const fn deadline_passed(now: u32, deadline: u32) -> bool {
    now.wrapping_sub(deadline) < u32::MAX / 2
}

pub struct MainLoop {
    last_sample_ms: u32,
    link: BleLink,
    reboot_at: Option<u32>,
    restarted: bool,
    samples: u32,
}

impl MainLoop {
    /// `now_ms` seeds the sample timer so the first sample waits one
    /// interval.
    pub fn new(now_ms: u32) -> Self {
        Self {
            last_sample_ms: now_ms,
            link: BleLink::new(),
            reboot_at: None,
            restarted: false,
            samples: 0,
        }
    }

    pub fn pending_reboot(&self) -> Option<u32> {
        self.reboot_at
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    fn schedule_reboot(&mut self, dev: &mut Device, grace_ms: u32) {
        self.reboot_at = Some(dev.clock.now_ms().wrapping_add(grace_ms));
        dev.events.push(AppEvent::RebootScheduled { in_ms: grace_ms });
    }

    pub fn tick(&mut self, dev: &mut Device) -> TickReport {
        let mut report = TickReport::default();
        let radio_up = dev.features.wifi && dev.radio.is_ready();

        // 1. WebSocket
        if radio_up {
            let discarded = dev.ws.service();
            if discarded > 0 {
                debug!("Loop: {} inbound WebSocket frame(s) dropped", discarded);
            }
        }

        // 2. BLE edge
        if dev.features.ble && dev.ble_ready() {
            report.readvertised = self.link.service(
                dev.ble.as_mut(),
                dev.clock.as_mut(),
                dev.config.ble.settle_ms,
                &mut dev.events,
            );
        }

        // 3. HTTP / OTA, then the radio event ring
        if radio_up && self.reboot_at.is_none() {
            let mut handler = Provisioning {
                radio: &mut dev.radio,
                credentials: &mut dev.credentials,
                flash: dev.flash.as_mut(),
                events: &mut dev.events,
                reboot: dev.config.reboot,
            };
            if let Some(PostAction::Reboot { grace_ms }) = dev.http.poll(&mut handler) {
                self.schedule_reboot(dev, grace_ms);
            }
        }
        if radio_up && self.reboot_at.is_none() {
            let outcome =
                serve_invitation(dev.net_update.as_mut(), dev.flash.as_mut(), &mut dev.events);
            if outcome.is_some_and(UploadOutcome::is_ok) {
                let grace_ms = dev.config.reboot.update_grace_ms;
                self.schedule_reboot(dev, grace_ms);
            }
        }
        if dev.features.wifi {
            events::drain_events(|e| info!("Radio: {}", e.describe()));
        }

        // 4. Events and LED
        while let Some(event) = dev.events.pop() {
            if let Some(burst) = event.burst() {
                dev.led_engine.push_burst(burst);
            }
            dev.sink.emit(&event);
        }
        if dev.features.status_led {
            let level = dev.led_engine.tick(dev.clock.now_ms());
            dev.led.set(level);
        }

        // 5. Sample
        let now = dev.clock.now_ms();
        if now.wrapping_sub(self.last_sample_ms) >= dev.config.stream.sample_interval_ms {
            let sample = dev.capture();
            let features = dev.features;
            let ble_on = dev.ble_ready();
            let transports = Transports {
                serial: dev.serial.as_mut().map(|s| s.as_mut() as &mut dyn SerialPort),
                ws: radio_up.then(|| dev.ws.as_mut() as &mut dyn WebSocketPort),
                ble: ble_on.then(|| dev.ble.as_mut() as &mut dyn BlePort),
            };
            report.transports = fan_out(&sample, features, transports);
            report.sampled = true;
            self.last_sample_ms = now;
            self.samples = self.samples.wrapping_add(1);
        }

        // 6. Yield
        dev.clock.delay_ms(dev.config.stream.yield_ms);

        // 7. Reboot
        if let Some(at) = self.reboot_at {
            if !self.restarted && deadline_passed(dev.clock.now_ms(), at) {
                info!("Loop: reboot deadline reached");
                self.restarted = true;
                report.restarted = true;
                dev.system.restart();
            }
        }

        report
    }
}
