//! HTTP router for the provisioning portal, JSON API, and firmware upload.
//!
//! | Route                    | Handler                  |
//! |--------------------------|--------------------------|
//! | `GET  /`                 | landing page             |
//! | `GET  /wifi`             | portal                   |
//! | `POST /wifi`             | save + reboot            |
//! | `POST /wifi/forget`      | clear                    |
//! | `GET  /update`           | upload form              |
//! | `POST /update`           | firmware upload + reboot |
//! | `GET  /api/wifi/status`  | JSON status              |
//! | `GET  /api/wifi/scan`    | JSON scan list           |
//! | `POST /api/wifi/config`  | JSON save + reboot       |
//! | `POST /api/wifi/forget`  | JSON clear               |
//!
//! Handlers that persist configuration validate first, write through the
//! credential store, and hand the restart to the scheduler as a
//! [`PostAction`] so it only happens after the reply has been flushed.

use log::info;

use crate::app::api::{ErrorReply, OkReply, ScanResult, WifiStatus, to_json};
use crate::app::credentials::{CredentialStore, MAX_PASSWORD_LEN, MAX_SSID_LEN};
use crate::app::events::{AppEvent, EventQueue};
use crate::app::http::{Form, HttpReply, HttpRequest, Method, PostAction};
use crate::app::ota::receive_upload;
use crate::app::portal;
use crate::app::ports::{FlashWriterPort, HttpHandler};
use crate::app::radio::RadioController;
use crate::config::RebootConfig;

/// Why submitted credentials were refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialInputError {
    SsidRequired,
    SsidTooLong,
    PasswordTooLong,
}

impl CredentialInputError {
    /// JSON error code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::SsidRequired => "ssid_required",
            Self::SsidTooLong => "ssid_too_long",
            Self::PasswordTooLong => "password_too_long",
        }
    }

    /// Plain-text message for the HTML form.
    pub const fn message(self) -> &'static str {
        match self {
            Self::SsidRequired => "SSID required",
            Self::SsidTooLong => "SSID too long",
            Self::PasswordTooLong => "Password too long",
        }
    }
}

/// Extract and check `ssid`/`password` from a submitted form.
pub fn validate_credentials(form: &Form) -> Result<(String, String), CredentialInputError> {
    let ssid = form.get("ssid").unwrap_or("");
    let password = form.get("password").unwrap_or("");
    if ssid.is_empty() {
        return Err(CredentialInputError::SsidRequired);
    }
    if ssid.len() > MAX_SSID_LEN {
        return Err(CredentialInputError::SsidTooLong);
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(CredentialInputError::PasswordTooLong);
    }
    Ok((ssid.to_string(), password.to_string()))
}

/// Borrowed device state for one request.
pub struct Provisioning<'a> {
    pub radio: &'a mut RadioController,
    pub credentials: &'a mut CredentialStore,
    pub flash: &'a mut dyn FlashWriterPort,
    pub events: &'a mut EventQueue,
    pub reboot: RebootConfig,
}

impl HttpHandler for Provisioning<'_> {
    fn handle(&mut self, request: &mut HttpRequest<'_>) -> HttpReply {
        match (request.method, request.path) {
            (Method::Get, "/") => self.landing(),
            (Method::Get, "/wifi") => self.wifi_portal(),
            (Method::Post, "/wifi") => self.wifi_save(request),
            (Method::Post, "/wifi/forget") => self.wifi_forget(),
            (Method::Get, "/update") => HttpReply::html(portal::update_page()),
            (Method::Post, "/update") => self.firmware_upload(request),
            (Method::Get, "/api/wifi/status") => self.api_status(),
            (Method::Get, "/api/wifi/scan") => self.api_scan(),
            (Method::Post, "/api/wifi/config") => self.api_config(request),
            (Method::Post, "/api/wifi/forget") => self.api_forget(),
            _ => HttpReply::not_found(),
        }
    }
}

impl Provisioning<'_> {
    fn landing(&mut self) -> HttpReply {
        HttpReply::html(portal::landing_page(&self.radio.status()))
    }

    fn wifi_portal(&mut self) -> HttpReply {
        let status = self.radio.status();
        let networks = self.radio.scan();
        let stored = self.credentials.stored_ssid();
        HttpReply::html(portal::wifi_page(&status, &networks, stored.as_deref()))
    }

    fn wifi_save(&mut self, request: &mut HttpRequest<'_>) -> HttpReply {
        let form = Form::from_request(request);
        match validate_credentials(&form) {
            Ok((ssid, password)) => {
                self.commit_credentials(&ssid, &password);
                HttpReply::html(portal::saved_page(&ssid)).then(PostAction::Reboot {
                    grace_ms: self.reboot.portal_grace_ms,
                })
            }
            Err(e) => HttpReply::text(400, e.message()),
        }
    }

    fn wifi_forget(&mut self) -> HttpReply {
        self.forget();
        HttpReply::html(portal::cleared_page())
    }

    fn firmware_upload(&mut self, request: &mut HttpRequest<'_>) -> HttpReply {
        let outcome = receive_upload(
            &mut *request.body,
            request.content_type,
            &mut *self.flash,
            &mut *self.events,
        );
        let reply = HttpReply::text(200, outcome.as_str()).closing();
        if outcome.is_ok() {
            reply.then(PostAction::Reboot {
                grace_ms: self.reboot.update_grace_ms,
            })
        } else {
            reply
        }
    }

    fn api_status(&mut self) -> HttpReply {
        let status = self.radio.status();
        let stored = self.credentials.stored_ssid();
        HttpReply::json(200, to_json(&WifiStatus::new(&status, stored)))
    }

    fn api_scan(&mut self) -> HttpReply {
        let networks = self.radio.scan();
        let list: Vec<ScanResult<'_>> = networks.iter().map(ScanResult::from).collect();
        HttpReply::json(200, to_json(&list))
    }

    fn api_config(&mut self, request: &mut HttpRequest<'_>) -> HttpReply {
        let form = Form::from_request(request);
        match validate_credentials(&form) {
            Ok((ssid, password)) => {
                self.commit_credentials(&ssid, &password);
                HttpReply::json(200, to_json(&OkReply::with_ssid(&ssid))).then(
                    PostAction::Reboot {
                        grace_ms: self.reboot.api_grace_ms,
                    },
                )
            }
            Err(e) => HttpReply::json(400, to_json(&ErrorReply::new(e.code()))),
        }
    }

    fn api_forget(&mut self) -> HttpReply {
        self.forget();
        HttpReply::json(200, to_json(&OkReply::plain()))
    }

    fn commit_credentials(&mut self, ssid: &str, password: &str) {
        // A failed save is logged by the store; the restart still happens
        // and the previous pair (if any) stays in effect.
        if self.credentials.save(ssid, password) {
            self.events.push(AppEvent::CredentialsSaved { ssid: ssid.into() });
        }
    }

    fn forget(&mut self) {
        self.credentials.clear();
        info!("Provisioning: stored Wi-Fi forgotten");
        self.events.push(AppEvent::CredentialsCleared);
    }
}
