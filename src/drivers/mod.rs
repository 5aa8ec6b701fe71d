//! Hardware initialisation and status LED drivers.

pub mod hw_init;
pub mod led_patterns;
pub mod status_led;
