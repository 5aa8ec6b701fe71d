//! One FSR sample and its CSV rendering.

use core::fmt::Write;

use heapless::String;

use crate::config::NUM_CHANNELS;

/// Readings are 12-bit on the S3; anything above 15 bits is clamped so the
/// line shape holds regardless of the ADC adapter.
pub const MAX_READING: u16 = 0x7FFF;

/// Fixed BLE/CSV line capacity.
pub const CSV_LINE_CAPACITY: usize = 64;

/// One reading of every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Capture time, wrapping milliseconds since boot.
    pub timestamp_ms: u32,
    pub values: [u16; NUM_CHANNELS],
}

impl Sample {
    pub fn new(timestamp_ms: u32, raw: [u16; NUM_CHANNELS]) -> Self {
        Self {
            timestamp_ms,
            values: raw.map(|v| v.min(MAX_READING)),
        }
    }

    /// Render as `v0,v1,...` (no timestamp, no trailing comma).
    pub fn to_csv(&self) -> CsvLine {
        let mut line = CsvLine::new();
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                push_truncated(&mut line, ",");
            }
            let mut field: String<5> = String::new();
            // A clamped reading has at most five digits.
            let _ = write!(field, "{v}");
            push_truncated(&mut line, &field);
        }
        line
    }
}

/// A CSV line in a fixed 64-byte buffer.
pub type CsvLine = String<CSV_LINE_CAPACITY>;

/// Append as much of `text` as fits; the rest is dropped.
pub fn push_truncated(line: &mut CsvLine, text: &str) {
    for c in text.chars() {
        if line.push(c).is_err() {
            break;
        }
    }
}
