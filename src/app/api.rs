//! JSON payloads for `/api/wifi/*`.

use serde::Serialize;

use crate::app::ports::ScanEntry;
use crate::app::radio::RadioStatus;

/// `GET /api/wifi/status`.  Field order is the wire order.
#[derive(Debug, Serialize)]
pub struct WifiStatus {
    pub mode: &'static str,
    pub sta_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sta_ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sta_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ap_ssid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ap_ip: Option<String>,
    /// Always present; `null` when nothing is stored.
    pub stored_ssid: Option<String>,
}

impl WifiStatus {
    pub fn new(status: &RadioStatus, stored_ssid: Option<String>) -> Self {
        Self {
            mode: status.mode.as_str(),
            sta_connected: status.sta_connected,
            sta_ssid: status.sta_ssid.clone(),
            sta_ip: status.sta_ip.map(|ip| ip.to_string()),
            ap_ssid: status.ap_ssid.clone(),
            ap_ip: status.ap_ip.map(|ip| ip.to_string()),
            stored_ssid,
        }
    }
}

/// One element of `GET /api/wifi/scan`.
#[derive(Debug, Serialize)]
pub struct ScanResult<'a> {
    pub ssid: &'a str,
    pub rssi: i8,
    pub secure: bool,
}

impl<'a> From<&'a ScanEntry> for ScanResult<'a> {
    fn from(e: &'a ScanEntry) -> Self {
        Self {
            ssid: &e.ssid,
            rssi: e.rssi,
            secure: e.secure,
        }
    }
}

/// `{"status":"ok"[,"ssid":...]}`.
#[derive(Debug, Serialize)]
pub struct OkReply<'a> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssid: Option<&'a str>,
}

impl<'a> OkReply<'a> {
    pub const fn plain() -> Self {
        Self {
            status: "ok",
            ssid: None,
        }
    }

    pub const fn with_ssid(ssid: &'a str) -> Self {
        Self {
            status: "ok",
            ssid: Some(ssid),
        }
    }
}

/// `{"status":"error","error":...}`.
#[derive(Debug, Serialize)]
pub struct ErrorReply {
    pub status: &'static str,
    pub error: &'static str,
}

impl ErrorReply {
    pub const fn new(error: &'static str) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Serialise a payload.  Serialisation of these plain structs cannot fail;
/// an empty object is returned if it ever does.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("{}"))
}
