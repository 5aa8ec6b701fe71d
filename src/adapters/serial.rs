//! USB serial line output.
//!
//! The console UART / USB-CDC is stdout under ESP-IDF's newlib, so the CSV
//! stream is written there directly, bypassing the `log` formatter.  The
//! host parser expects bare lines.

use std::io::Write;

use crate::app::ports::SerialPort;

pub struct StdoutSerial {
    failures: u32,
}

impl StdoutSerial {
    pub fn new() -> Self {
        Self { failures: 0 }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl Default for StdoutSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPort for StdoutSerial {
    fn write_line(&mut self, line: &str) {
        let mut out = std::io::stdout().lock();
        // A disconnected host must not stall sampling; count and move on.
        if out.write_all(line.as_bytes()).is_err() || out.write_all(b"\n").is_err() {
            self.failures = self.failures.wrapping_add(1);
            return;
        }
        let _ = out.flush();
    }
}
