//! Per-sample transport fanout: serial, then WebSocket, then BLE.

use crate::app::ports::{BlePort, SerialPort, WebSocketPort};
use crate::app::sample::Sample;
use crate::config::FeatureFlags;

/// Borrowed transports for one sample.  A `None` transport is compiled
/// out or was not brought up this boot.
pub struct Transports<'a> {
    pub serial: Option<&'a mut dyn SerialPort>,
    pub ws: Option<&'a mut dyn WebSocketPort>,
    pub ble: Option<&'a mut dyn BlePort>,
}

/// Emit one CSV line on every enabled, connected transport.  Returns how
/// many transports were written.
pub fn fan_out(sample: &Sample, features: FeatureFlags, transports: Transports<'_>) -> u8 {
    let line = sample.to_csv();
    let mut sent = 0;

    if features.serial {
        if let Some(serial) = transports.serial {
            serial.write_line(line.as_str());
            sent += 1;
        }
    }

    if features.wifi {
        if let Some(ws) = transports.ws {
            if ws.client_count() > 0 {
                ws.broadcast_text(line.as_str());
                sent += 1;
            }
        }
    }

    if features.ble {
        if let Some(ble) = transports.ble {
            if ble.is_connected() && ble.has_characteristic() {
                ble.notify(line.as_bytes());
                sent += 1;
            }
        }
    }

    sent
}
