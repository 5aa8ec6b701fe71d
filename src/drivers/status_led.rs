//! Single-colour status LED driver.
//!
//! Generic over any `embedded-hal` output pin.  On ESP-IDF this is a
//! `PinDriver` on the Feather's LED GPIO; host tests plug in a recording
//! pin.  Writes are skipped when the level is unchanged.

use embedded_hal::digital::OutputPin;
use log::warn;

use crate::app::ports::LedPort;

pub struct StatusLed<P: OutputPin> {
    pin: P,
    current: Option<bool>,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, current: None }
    }

    pub fn is_on(&self) -> bool {
        self.current.unwrap_or(false)
    }
}

impl<P: OutputPin> LedPort for StatusLed<P> {
    fn set(&mut self, on: bool) {
        if self.current == Some(on) {
            return;
        }
        let res = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match res {
            Ok(()) => self.current = Some(on),
            Err(e) => warn!("StatusLed: pin write failed: {:?}", e),
        }
    }
}
