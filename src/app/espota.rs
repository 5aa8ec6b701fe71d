//! Network firmware upload (espota / ArduinoOTA protocol) on UDP 3232.
//!
//! ```text
//!   uploader ──UDP "0 <port> <size> <md5>\n"──▶ device
//!   uploader ◀──────────── UDP "OK" ─────────── device
//!   uploader ◀──── TCP connect to <port> ────── device   (begin first)
//!   uploader ───── image, ≤1460 B per read ───▶ device
//!   uploader ◀──── decimal byte count per read ─ device
//!   uploader ◀──────────── "OK" | "ERR" ─────── device   (after end)
//! ```
//!
//! The writer is opened before connecting back, so an image that cannot
//! fit fails without any data moving.  The image is committed only when
//! exactly `size` bytes arrived and their MD5 matches the invitation.

use core::fmt;
use std::io::{ErrorKind, Read, Write};

use log::{info, warn};
use md5::{Digest, Md5};

use crate::app::events::EventQueue;
use crate::app::multipart::PartSink;
use crate::app::ota::{FirmwareUpload, UploadOutcome};
use crate::app::ports::{FlashWriterPort, ImageStream, NetUpdatePort};

/// Invitation command for an application image.
pub const CMD_FLASH: u32 = 0;
/// Filesystem image; there is no filesystem partition to take it.
pub const CMD_FILESYSTEM: u32 = 100;

/// Largest read per step, one TCP segment.
pub const PULL_CHUNK: usize = 1460;

/// Stalled reads tolerated, each answered by repeating the last count.
pub const STALL_RETRIES: u8 = 3;

/// Label used for the update session in logs.
const IMAGE_NAME: &str = "espota";

/// Hex MD5 digest of the whole image.
pub type Md5Hex = heapless::String<32>;

/// A parsed upload invitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub command: u32,
    /// TCP port the uploader listens on for the data connection.
    pub data_port: u16,
    /// Image size in bytes.
    pub size: u32,
    pub md5: Md5Hex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteError {
    /// Not four whitespace-separated fields, or a number did not parse.
    Malformed,
    UnsupportedCommand(u32),
    /// Digest is not 32 hex characters.
    BadDigest,
    EmptyImage,
}

impl fmt::Display for InviteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed invitation"),
            Self::UnsupportedCommand(c) => write!(f, "unsupported command {c}"),
            Self::BadDigest => write!(f, "bad MD5 digest"),
            Self::EmptyImage => write!(f, "empty image"),
        }
    }
}

impl Invitation {
    /// Parse `"<command> <port> <size> <md5>\n"`.
    pub fn parse(datagram: &[u8]) -> Result<Self, InviteError> {
        let text = core::str::from_utf8(datagram).map_err(|_| InviteError::Malformed)?;
        let mut fields = text.split_ascii_whitespace();
        let mut number = || fields.next().and_then(|f| f.parse::<u32>().ok());

        let command = number().ok_or(InviteError::Malformed)?;
        let data_port = number()
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p != 0)
            .ok_or(InviteError::Malformed)?;
        let size = number().ok_or(InviteError::Malformed)?;
        let digest = fields.next().ok_or(InviteError::Malformed)?;
        if fields.next().is_some() {
            return Err(InviteError::Malformed);
        }

        if command != CMD_FLASH {
            return Err(InviteError::UnsupportedCommand(command));
        }
        if digest.len() != 32 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InviteError::BadDigest);
        }
        if size == 0 {
            return Err(InviteError::EmptyImage);
        }
        let mut md5 = Md5Hex::new();
        for c in digest.chars() {
            md5.push(c.to_ascii_lowercase())
                .map_err(|_| InviteError::BadDigest)?;
        }
        Ok(Self {
            command,
            data_port,
            size,
            md5,
        })
    }
}

/// Lowercase hex of an MD5 digest.
fn hex_digest(hasher: Md5) -> Md5Hex {
    use core::fmt::Write as _;
    let mut out = Md5Hex::new();
    for byte in hasher.finalize() {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Serve at most one pending invitation.  `None` when nothing was waiting.
pub fn serve_invitation(
    net: &mut dyn NetUpdatePort,
    flash: &mut dyn FlashWriterPort,
    events: &mut EventQueue,
) -> Option<UploadOutcome> {
    let invite = net.poll_invitation()?;
    Some(run_update(net, &invite, flash, events))
}

/// Pull the image announced by `invite` into the update slot.
pub fn run_update(
    net: &mut dyn NetUpdatePort,
    invite: &Invitation,
    flash: &mut dyn FlashWriterPort,
    events: &mut EventQueue,
) -> UploadOutcome {
    let mut upload = FirmwareUpload::new(flash, events);
    upload.begin(IMAGE_NAME);
    let room = upload.session().filter(|s| s.is_open()).map(|s| s.expected);
    match room {
        Some(max) if invite.size <= max => {}
        Some(max) => {
            warn!("OTA: {} byte image exceeds {max} byte region", invite.size);
            upload.abort();
            return upload.finish();
        }
        None => return upload.finish(),
    }

    let mut stream = match net.connect(invite) {
        Ok(s) => s,
        Err(e) => {
            warn!("OTA: {e}");
            upload.abort();
            return upload.finish();
        }
    };

    let mut hasher = Md5::new();
    let received = pull_image(stream.as_mut(), invite.size, &mut upload, &mut hasher);

    if received != invite.size {
        warn!("OTA: received {received} of {} bytes", invite.size);
        upload.abort();
    } else {
        let digest = hex_digest(hasher);
        if digest == invite.md5 {
            upload.end();
        } else {
            warn!("OTA: MD5 mismatch (got {digest}, expected {})", invite.md5);
            upload.abort();
        }
    }

    let outcome = upload.finish();
    let verdict: &[u8] = if outcome.is_ok() { b"OK" } else { b"ERR" };
    if let Err(e) = stream.write_all(verdict).and_then(|()| stream.flush()) {
        warn!("OTA: could not report result ({e})");
    }
    if outcome.is_ok() {
        info!("OTA: network upload of {} bytes complete", invite.size);
    }
    outcome
}

/// Read until `size` bytes arrived or the uploader goes quiet.  Every
/// successful read is acknowledged with its length in decimal.
fn pull_image(
    stream: &mut dyn ImageStream,
    size: u32,
    upload: &mut FirmwareUpload<'_>,
    hasher: &mut Md5,
) -> u32 {
    let mut buf = [0u8; PULL_CHUNK];
    let mut received: u32 = 0;
    let mut last_ack: usize = 0;
    let mut stalls: u8 = 0;

    while received < size {
        let want = ((size - received) as usize).min(PULL_CHUNK);
        match stream.read(&mut buf[..want]) {
            Ok(0) => {
                warn!("OTA: uploader closed the connection");
                break;
            }
            Ok(n) => {
                stalls = 0;
                hasher.update(&buf[..n]);
                upload.data(&buf[..n]);
                received += n as u32;
                last_ack = n;
                if let Err(e) = write!(stream, "{n}") {
                    warn!("OTA: ack failed ({e})");
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                if received == 0 || stalls >= STALL_RETRIES {
                    warn!("OTA: receive timed out after {received} bytes");
                    break;
                }
                stalls += 1;
                info!("OTA: stalled, repeating ack ({stalls}/{STALL_RETRIES})");
                if write!(stream, "{last_ack}").is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("OTA: receive failed ({e})");
                break;
            }
        }
    }
    received
}
