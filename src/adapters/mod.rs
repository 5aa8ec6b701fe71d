//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements        | Connects to                  |
//! |---------------|-------------------|------------------------------|
//! | `ble`         | BlePort           | Bluedroid GATT server        |
//! | `espota`      | NetUpdatePort     | UDP/3232 + TCP back-connect  |
//! | `flash`       | FlashWriterPort   | esp-ota update partition     |
//! | `hardware`    | AdcPort           | ESP32-S3 ADC2 (FSR inputs)   |
//! | `http_server` | HttpServerPort    | tiny_http on TCP/80          |
//! | `log_sink`    | EventSink         | Serial log output            |
//! | `mdns`        | MdnsPort          | ESP-IDF mdns component       |
//! | `nvs`         | StoragePort       | NVS / in-memory store        |
//! | `offline`     | StoragePort, RadioPort | Nothing (driver failed) |
//! | `serial`      | SerialPort        | USB-CDC stdout               |
//! | `system`      | SystemPort        | Restart, rollback, partitions|
//! | `time`        | ClockPort         | ESP32 system timer           |
//! | `websocket`   | WebSocketPort     | esp_http_server WS on TCP/81 |
//! | `wifi`        | RadioPort         | ESP-IDF Wi-Fi AP+STA         |

pub mod ble;
pub mod espota;
pub mod flash;
pub mod hardware;
pub mod http_server;
pub mod log_sink;
pub mod mdns;
pub mod nvs;
pub mod offline;
pub mod serial;
pub mod system;
pub mod time;
pub mod websocket;
pub mod wifi;
