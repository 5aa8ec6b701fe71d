//! HTML pages for the provisioning portal.
//!
//! Plain server-rendered HTML with no scripts.  Every SSID (ours or one
//! heard over the air) is entity-escaped before it is rendered.

use core::fmt::Write;

use crate::app::ports::ScanEntry;
use crate::app::radio::RadioStatus;

/// Escape text for HTML element and attribute content.
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const BACK_LINK: &str = "<p><a href=\"/\">Back</a></p>";

/// `GET /`
pub fn landing_page(status: &RadioStatus) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>Cardinal Grip</title></head><body>\
         <h1>Cardinal Grip ESP32</h1><p>Firmware streaming is active.</p>",
    );

    if status.mode.has_station() {
        if status.sta_connected {
            let _ = write!(
                html,
                "<p>Mode: STA, SSID: {}</p><p>IP: {}</p>",
                html_escape(status.sta_ssid.as_deref().unwrap_or("")),
                ip_text(status.sta_ip)
            );
        } else {
            html.push_str("<p>Mode: STA, not connected</p>");
        }
    }
    if let Some(ap_ssid) = &status.ap_ssid {
        let _ = write!(
            html,
            "<p>AP SSID: {} (IP: {})</p>",
            html_escape(ap_ssid),
            ip_text(status.ap_ip)
        );
    }

    html.push_str(
        "<p><a href=\"/wifi\">Wi-Fi Setup</a></p>\
         <p><a href=\"/update\">Firmware Update</a></p></body></html>",
    );
    html
}

/// `GET /update`
pub fn update_page() -> String {
    format!(
        "<!DOCTYPE html><html><head><title>OTA Update</title></head><body>\
         <h1>Firmware OTA Update</h1>\
         <form method='POST' action='/update' enctype='multipart/form-data'>\
         <input type='file' name='firmware'>\
         <input type='submit' value='Update'>\
         </form>{BACK_LINK}</body></html>"
    )
}

/// `GET /wifi`
pub fn wifi_page(status: &RadioStatus, networks: &[ScanEntry], stored_ssid: Option<&str>) -> String {
    let mut html = String::from(
        "<!DOCTYPE html><html><head><title>Wi-Fi Setup</title></head><body><h1>Wi-Fi Setup</h1>",
    );

    if status.sta_connected {
        let _ = write!(
            html,
            "<p>Current STA: {} ({})</p>",
            html_escape(status.sta_ssid.as_deref().unwrap_or("")),
            ip_text(status.sta_ip)
        );
    } else {
        html.push_str("<p>STA not connected.</p>");
    }

    html.push_str("<h2>Available Networks</h2>");
    if networks.is_empty() {
        html.push_str("<p>No networks found (try again).</p>");
    } else {
        html.push_str("<form method='POST' action='/wifi'><p>Select SSID:</p>");
        for net in networks {
            let ssid = html_escape(&net.ssid);
            let _ = write!(
                html,
                "<label><input type='radio' name='ssid' value='{ssid}'>{ssid} (RSSI {} dBm){}</label><br>",
                net.rssi,
                if net.secure { " \u{1F512}" } else { "" }
            );
        }
        html.push_str(
            "<p>Password: <input type='password' name='password'></p>\
             <input type='submit' value='Save &amp; Reboot'></form>",
        );
    }

    html.push_str("<h2>Stored Credentials</h2>");
    match stored_ssid {
        Some(ssid) => {
            let _ = write!(
                html,
                "<p>Stored SSID: {}</p>\
                 <form method='POST' action='/wifi/forget'>\
                 <input type='submit' value='Forget Stored Wi-Fi'></form>",
                html_escape(ssid)
            );
        }
        None => html.push_str("<p>No stored Wi-Fi.</p>"),
    }

    html.push_str(BACK_LINK);
    html.push_str("</body></html>");
    html
}

/// Reply to a successful `POST /wifi`.
pub fn saved_page(ssid: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body><p>Saved Wi-Fi credentials for SSID: {}</p>\
         <p>Device will reboot and try to connect.</p></body></html>",
        html_escape(ssid)
    )
}

/// Reply to `POST /wifi/forget`.
pub fn cleared_page() -> String {
    String::from(
        "<!DOCTYPE html><html><body><p>Stored Wi-Fi credentials cleared.</p>\
         <p><a href=\"/wifi\">Back to Wi-Fi Setup</a></p></body></html>",
    )
}

fn ip_text(ip: Option<std::net::Ipv4Addr>) -> String {
    ip.map_or_else(|| String::from("0.0.0.0"), |ip| ip.to_string())
}
