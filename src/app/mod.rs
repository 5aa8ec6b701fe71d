//! Application core — pure domain logic, zero direct I/O.
//!
//! Credential precedence, radio bring-up, sample fanout, the BLE reconnect
//! edge, firmware upload (HTTP and espota), and the HTTP surface.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod api;
pub mod ble_link;
pub mod credentials;
pub mod espota;
pub mod events;
pub mod fanout;
pub mod http;
pub mod multipart;
pub mod ota;
pub mod portal;
pub mod ports;
pub mod provisioning;
pub mod radio;
pub mod sample;
