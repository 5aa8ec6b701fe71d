//! Firmware upload over HTTP.
//!
//! Flow: begin (first chunk) → N × write → end, or abort when the client
//! drops or the body is cut short.  A write that stores fewer bytes than
//! offered sets the session's error flag; the body is still drained so
//! the client receives a reply.  The reply is `OK` iff the flag was never
//! set.

use std::io::{ErrorKind, Read};

use log::{info, warn};

use crate::app::events::{AppEvent, EventQueue};
use crate::app::multipart::{
    CHUNK_SIZE, MultipartParser, PartSink, boundary_from_content_type,
};
use crate::app::ports::FlashWriterPort;

/// Form field carrying the image.
pub const FIRMWARE_FIELD: &str = "firmware";

/// Space kept free at the end of the update partition.
const REGION_RESERVE: u32 = 0x1000;

/// Flash sector alignment.
const SECTOR_MASK: u32 = !0xFFF;

/// Writable region for an update given the partition's free space.
pub const fn update_region(free_space: u32) -> u32 {
    free_space.saturating_sub(REGION_RESERVE) & SECTOR_MASK
}

/// State of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSession {
    /// Writable region size.
    pub expected: u32,
    pub written: u32,
    pub error: bool,
    /// Writer is open (between begin and end/abort).
    open: bool,
}

impl UpdateSession {
    fn new(expected: u32) -> Self {
        Self {
            expected,
            written: 0,
            error: false,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

/// Outcome reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Ok { bytes: u32 },
    Failed,
}

impl UploadOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok { .. } => "OK",
            Self::Failed => "FAIL",
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

/// Routes the firmware part into the flash writer.
pub struct FirmwareUpload<'a> {
    flash: &'a mut dyn FlashWriterPort,
    events: &'a mut EventQueue,
    session: Option<UpdateSession>,
}

impl<'a> FirmwareUpload<'a> {
    pub fn new(flash: &'a mut dyn FlashWriterPort, events: &'a mut EventQueue) -> Self {
        Self {
            flash,
            events,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&UpdateSession> {
        self.session.as_ref()
    }

    /// Close out the upload and report.
    pub fn finish(mut self) -> UploadOutcome {
        let outcome = match self.session.as_mut() {
            None => {
                warn!("OTA: no '{FIRMWARE_FIELD}' part in upload");
                UploadOutcome::Failed
            }
            Some(s) => {
                if s.open {
                    // Writer still open means the end delimiter never came.
                    self.flash.abort();
                    s.open = false;
                    s.error = true;
                }
                if s.error {
                    UploadOutcome::Failed
                } else {
                    UploadOutcome::Ok { bytes: s.written }
                }
            }
        };
        match outcome {
            UploadOutcome::Ok { bytes } => {
                info!("OTA: success, {bytes} bytes");
                self.events.push(AppEvent::OtaSucceeded { bytes });
            }
            UploadOutcome::Failed => {
                warn!("OTA: failed");
                self.events.push(AppEvent::OtaFailed);
            }
        }
        outcome
    }
}

impl PartSink for FirmwareUpload<'_> {
    fn begin(&mut self, filename: &str) {
        if let Some(s) = self.session.as_mut() {
            // One session per request; a second image part poisons it.
            warn!("OTA: duplicate firmware part '{filename}' ignored");
            s.error = true;
            return;
        }

        let max = update_region(self.flash.free_space());
        info!("OTA: start '{filename}' (region {max} bytes)");
        let mut session = UpdateSession::new(max);
        match self.flash.begin(max) {
            Ok(()) => session.open = true,
            Err(e) => {
                warn!("OTA: begin failed: {e}");
                session.error = true;
            }
        }
        self.events.push(AppEvent::OtaStarted { max_size: max });
        self.session = Some(session);
    }

    fn data(&mut self, bytes: &[u8]) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        if !s.open || bytes.is_empty() {
            return;
        }
        let n = self.flash.write(bytes);
        s.written = s.written.saturating_add(n as u32);
        if n != bytes.len() {
            if !s.error {
                warn!("OTA: short write ({n}/{} bytes)", bytes.len());
            }
            s.error = true;
        }
    }

    fn end(&mut self) {
        let Some(s) = self.session.as_mut() else {
            return;
        };
        if !s.open {
            return;
        }
        s.open = false;
        if s.error {
            self.flash.abort();
            return;
        }
        if s.written == 0 {
            warn!("OTA: empty image");
            self.flash.abort();
            s.error = true;
            return;
        }
        match self.flash.end() {
            Ok(size) => info!("OTA: image committed ({size} bytes)"),
            Err(e) => {
                warn!("OTA: end failed: {e}");
                s.error = true;
            }
        }
    }

    fn abort(&mut self) {
        if let Some(s) = self.session.as_mut() {
            if s.open {
                self.flash.abort();
                s.open = false;
            }
            s.error = true;
            warn!("OTA: aborted after {} bytes", s.written);
        }
    }
}

/// Drain a multipart body from `body`, streaming the firmware part into
/// `flash`.  Never fails; the outcome is what the client is told.
pub fn receive_upload(
    body: &mut dyn Read,
    content_type: Option<&str>,
    flash: &mut dyn FlashWriterPort,
    events: &mut EventQueue,
) -> UploadOutcome {
    let mut upload = FirmwareUpload::new(flash, events);

    let Some(boundary) = content_type.and_then(boundary_from_content_type) else {
        warn!("OTA: request is not multipart/form-data");
        return upload.finish();
    };

    let mut parser = MultipartParser::new(boundary, FIRMWARE_FIELD);
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        match body.read(&mut chunk) {
            Ok(0) => {
                if let Err(e) = parser.finish(&mut upload) {
                    warn!("OTA: {e}");
                }
                break;
            }
            Ok(n) => {
                if let Err(e) = parser.feed(&chunk[..n], &mut upload) {
                    warn!("OTA: {e}");
                    upload.abort();
                    break;
                }
                if parser.is_done() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("OTA: client dropped ({e})");
                upload.abort();
                break;
            }
        }
    }
    upload.finish()
}
