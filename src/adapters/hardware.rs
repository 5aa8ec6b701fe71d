//! Hardware adapter — bridges the FSR inputs to [`AdcPort`].
//!
//! Channel `i` is the FSR on [`pins::FSR_GPIOS`]`[i]`.  A conversion that
//! fails (ADC2 contends with the Wi-Fi PHY) keeps the channel's previous
//! reading so a dropped conversion never shows up as a zero spike.  On
//! non-espidf targets a slow synthetic ramp stands in for the sensors.

use crate::app::ports::AdcPort;
use crate::config::NUM_CHANNELS;
use crate::drivers::hw_init;
use crate::pins;

#[cfg(target_os = "espidf")]
use log::debug;

pub struct FsrAdc {
    last: [u16; NUM_CHANNELS],
    failures: u32,
    #[cfg(not(target_os = "espidf"))]
    phase: u16,
}

impl FsrAdc {
    pub fn new() -> Self {
        Self {
            last: [0; NUM_CHANNELS],
            failures: 0,
            #[cfg(not(target_os = "espidf"))]
            phase: 0,
        }
    }

    /// Conversions that failed since boot.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    #[cfg(target_os = "espidf")]
    fn convert(&mut self, channel: usize) -> Option<u16> {
        match hw_init::adc2_read(pins::FSR_ADC2_CHANNELS[channel]) {
            Ok(v) => Some(v),
            Err(rc) => {
                debug!("FsrAdc: ch{} read failed (rc={})", channel, rc);
                None
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn convert(&mut self, channel: usize) -> Option<u16> {
        // Keep the hw_init path exercised; the sim read always succeeds.
        let _ = hw_init::adc2_read(pins::FSR_ADC2_CHANNELS[channel]).ok()?;
        if channel == 0 {
            self.phase = (self.phase + 7) % 4096;
        }
        let offset = (channel as u16) * 1024;
        Some((self.phase + offset) % 4096)
    }
}

impl Default for FsrAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl AdcPort for FsrAdc {
    fn read(&mut self, channel: usize) -> u16 {
        if channel >= NUM_CHANNELS {
            return 0;
        }
        match self.convert(channel) {
            Some(v) => {
                self.last[channel] = v;
                v
            }
            None => {
                self.failures = self.failures.wrapping_add(1);
                self.last[channel]
            }
        }
    }
}
