//! GPIO / ADC pin assignments for the Adafruit Feather ESP32-S3 grip board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.

use crate::config::NUM_CHANNELS;

// ---------------------------------------------------------------------------
// FSR inputs (Feather A0..A3)
// ---------------------------------------------------------------------------

/// FSR divider outputs, in channel order (index finger first).
pub const FSR_GPIOS: [i32; NUM_CHANNELS] = [18, 17, 16, 15];

/// ADC2 channel for each entry of [`FSR_GPIOS`] on the ESP32-S3
/// (GPIO15..18 map to ADC2_CH4..CH7).
pub const FSR_ADC2_CHANNELS: [u32; NUM_CHANNELS] = [7, 6, 5, 4];

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// Feather "LED" pin, active high.
pub const STATUS_LED_GPIO: i32 = 13;
