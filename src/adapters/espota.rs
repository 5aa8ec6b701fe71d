//! Network-upload listener (UDP/3232).
//!
//! Implements [`NetUpdatePort`] over `std::net`, which lwIP provides on
//! ESP-IDF, so one implementation serves both targets.  The UDP socket is
//! non-blocking and read from the main tick; the data connection is
//! opened back to the invitation's sender with bounded timeouts.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

use log::{info, warn};

use crate::app::espota::Invitation;
use crate::app::ports::{ImageStream, NetUpdatePort};
use crate::error::ServerError;

/// Attempts at the data connection before giving up.
const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_TIMEOUT: Duration = Duration::from_millis(1_000);
/// Silence tolerated on the data connection per read.
const READ_TIMEOUT: Duration = Duration::from_millis(1_000);
/// Invitations are one short line.
const DATAGRAM_MAX: usize = 128;

pub struct EspotaListener {
    socket: Option<UdpSocket>,
    /// Sender of the last accepted invitation.
    peer: Option<IpAddr>,
    accepted: u32,
}

impl EspotaListener {
    pub fn new() -> Self {
        Self {
            socket: None,
            peer: None,
            accepted: 0,
        }
    }

    /// Port actually bound (differs from the request when 0 was asked for).
    pub fn local_port(&self) -> Option<u16> {
        self.socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
            .map(|a| a.port())
    }

    /// Invitations acknowledged since start.
    pub fn accepted(&self) -> u32 {
        self.accepted
    }
}

impl Default for EspotaListener {
    fn default() -> Self {
        Self::new()
    }
}

impl NetUpdatePort for EspotaListener {
    fn start(&mut self, port: u16) -> Result<(), ServerError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = UdpSocket::bind(("0.0.0.0", port)).map_err(|e| {
            warn!("OTA: bind UDP {} failed: {}", port, e);
            ServerError::BindFailed(port)
        })?;
        socket.set_nonblocking(true).map_err(|e| {
            warn!("OTA: UDP {} non-blocking mode failed: {}", port, e);
            ServerError::BindFailed(port)
        })?;
        info!("OTA: network upload listener on UDP {}", port);
        self.socket = Some(socket);
        Ok(())
    }

    fn poll_invitation(&mut self) -> Option<Invitation> {
        let socket = self.socket.as_ref()?;
        let mut buf = [0u8; DATAGRAM_MAX];
        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return None,
            Err(e) => {
                warn!("OTA: UDP receive failed: {}", e);
                return None;
            }
        };

        let invite = match Invitation::parse(&buf[..len]) {
            Ok(i) => i,
            Err(e) => {
                warn!("OTA: ignoring invitation from {}: {}", from, e);
                return None;
            }
        };
        if let Err(e) = socket.send_to(b"OK", from) {
            warn!("OTA: could not answer {}: {}", from, e);
            return None;
        }
        info!(
            "OTA: invitation from {} ({} bytes, data port {})",
            from.ip(),
            invite.size,
            invite.data_port
        );
        self.peer = Some(from.ip());
        self.accepted = self.accepted.wrapping_add(1);
        Some(invite)
    }

    fn connect(&mut self, invite: &Invitation) -> Result<Box<dyn ImageStream>, ServerError> {
        let ip = self.peer.ok_or(ServerError::ConnectFailed)?;
        let addr = SocketAddr::new(ip, invite.data_port);
        for attempt in 1..=CONNECT_ATTEMPTS {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(READ_TIMEOUT))
                        .and_then(|()| stream.set_nodelay(true))
                        .map_err(|e| {
                            warn!("OTA: data connection setup failed: {}", e);
                            ServerError::ConnectFailed
                        })?;
                    return Ok(Box::new(stream));
                }
                Err(e) => warn!("OTA: connect {} attempt {} failed: {}", addr, attempt, e),
            }
        }
        Err(ServerError::ConnectFailed)
    }
}
