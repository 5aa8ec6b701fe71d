//! WebSocket broadcast adapter (TCP/81).
//!
//! Implements [`WebSocketPort`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: a second `EspHttpServer` instance with a
//!   WebSocket handler on `/`.  The handler runs on the httpd task and only
//!   touches the mutex-guarded client list and an atomic inbound counter;
//!   broadcasts go out through detached senders, cloned out of the list
//!   so the main task never holds the lock across a send.
//! - **all other targets**: simulation with test hooks for clients and
//!   inbound frames.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::app::ports::WebSocketPort;
use crate::error::ServerError;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicI32};
#[cfg(not(target_os = "espidf"))]
use std::sync::Weak;

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::server::{
    Configuration, EspHttpServer,
    ws::{EspHttpWsConnection, EspHttpWsDetachedSender},
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::ws::FrameType;

#[cfg(target_os = "espidf")]
type Sender = EspHttpWsDetachedSender;

#[cfg(not(target_os = "espidf"))]
type Sender = SimSender;

struct WsClient {
    session: i32,
    sender: Sender,
}

type ClientList = Arc<Mutex<Vec<WsClient>>>;

/// Simulated httpd-side state shared by the server and every sender.
#[cfg(not(target_os = "espidf"))]
struct SimHooks {
    next_session: AtomicI32,
    /// The next send also performs a handshake, as the httpd task would.
    join_on_send: AtomicBool,
    /// Handshakes that found the client list locked.
    contended: AtomicUsize,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Clone)]
struct SimSender {
    frames: Arc<Mutex<Vec<String>>>,
    /// Simulated send failure.
    broken: Arc<AtomicBool>,
    clients: Weak<Mutex<Vec<WsClient>>>,
    hooks: Arc<SimHooks>,
}

#[cfg(not(target_os = "espidf"))]
impl SimSender {
    fn client(session: i32, clients: &ClientList, hooks: &Arc<SimHooks>) -> WsClient {
        WsClient {
            session,
            sender: Self {
                frames: Arc::default(),
                broken: Arc::default(),
                clients: Arc::downgrade(clients),
                hooks: Arc::clone(hooks),
            },
        }
    }

    fn send(&mut self, text: &str) -> bool {
        if self.hooks.join_on_send.swap(false, Ordering::Relaxed) {
            self.handshake();
        }
        if self.broken.load(Ordering::Relaxed) {
            return false;
        }
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(text.to_owned());
        }
        true
    }

    /// What the httpd task does for a new connection.  Never blocks, so a
    /// lock held by the sending task shows up as contention.
    fn handshake(&self) {
        let Some(list) = self.clients.upgrade() else {
            return;
        };
        match list.try_lock() {
            Ok(mut clients) => {
                let session = self.hooks.next_session.fetch_add(1, Ordering::Relaxed);
                clients.push(Self::client(session, &list, &self.hooks));
            }
            Err(_) => {
                self.hooks.contended.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

pub struct WsServer {
    #[cfg(target_os = "espidf")]
    server: Option<EspHttpServer<'static>>,
    clients: ClientList,
    inbound: Arc<AtomicUsize>,
    started: bool,
    dropped: u32,
    #[cfg(not(target_os = "espidf"))]
    hooks: Arc<SimHooks>,
}

impl WsServer {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            server: None,
            clients: Arc::new(Mutex::new(Vec::new())),
            inbound: Arc::new(AtomicUsize::new(0)),
            started: false,
            dropped: 0,
            #[cfg(not(target_os = "espidf"))]
            hooks: Arc::new(SimHooks {
                next_session: AtomicI32::new(1),
                join_on_send: AtomicBool::new(false),
                contended: AtomicUsize::new(0),
            }),
        }
    }

    /// Clients removed after a failed send.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Simulate a client handshake.  Returns its session id.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect(&mut self) -> i32 {
        let session = self.hooks.next_session.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut clients) = self.clients.lock() {
            clients.push(SimSender::client(session, &self.clients, &self.hooks));
        }
        session
    }

    /// Make every later send to `session` fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_break(&mut self, session: i32) {
        if let Ok(clients) = self.clients.lock() {
            for c in clients.iter().filter(|c| c.session == session) {
                c.sender.broken.store(true, Ordering::Relaxed);
            }
        }
    }

    /// Let a new client complete its handshake while the next frame is
    /// being sent.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect_during_send(&mut self) {
        self.hooks.join_on_send.store(true, Ordering::Relaxed);
    }

    /// Handshakes that found the client list locked by a send.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_send_contention(&self) -> usize {
        self.hooks.contended.load(Ordering::Relaxed)
    }

    /// Simulate a frame arriving from a client.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inbound(&self) {
        self.inbound.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames delivered to `session` so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_frames(&self, session: i32) -> Vec<String> {
        let frames = self.clients.lock().ok().and_then(|clients| {
            clients
                .iter()
                .find(|c| c.session == session)
                .map(|c| Arc::clone(&c.sender.frames))
        });
        frames
            .and_then(|shared| shared.lock().ok().map(|delivered| delivered.clone()))
            .unwrap_or_default()
    }

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self, port: u16) -> Result<(), ServerError> {
        let config = Configuration {
            http_port: port,
            // The portal server owns the default control port.
            ctrl_port: 32769,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&config).map_err(|e| {
            warn!("WS: server create failed: {:?}", e);
            ServerError::BindFailed(port)
        })?;

        let clients = Arc::clone(&self.clients);
        let inbound = Arc::clone(&self.inbound);
        server
            .ws_handler("/", move |ws: &mut EspHttpWsConnection| {
                let session = ws.session();
                if ws.is_new() {
                    let sender = ws.create_detached_sender()?;
                    if let Ok(mut list) = clients.lock() {
                        list.push(WsClient { session, sender });
                    }
                    info!("WS: client {} connected", session);
                } else if ws.is_closed() {
                    if let Ok(mut list) = clients.lock() {
                        list.retain(|c| c.session != session);
                    }
                    info!("WS: client {} closed", session);
                } else {
                    let (_, len) = ws.recv(&mut [])?;
                    let mut buf = vec![0u8; len];
                    ws.recv(&mut buf)?;
                    inbound.fetch_add(1, Ordering::Relaxed);
                }
                Ok::<(), esp_idf_svc::sys::EspError>(())
            })
            .map_err(|e| {
                warn!("WS: handler register failed: {:?}", e);
                ServerError::HandlerFailed
            })?;
        self.server = Some(server);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self, port: u16) -> Result<(), ServerError> {
        info!("WS(sim): listening on :{}", port);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn send(sender: &mut Sender, text: &str) -> bool {
        sender
            .send(FrameType::Text(false), text.as_bytes())
            .is_ok()
    }

    #[cfg(not(target_os = "espidf"))]
    fn send(sender: &mut Sender, text: &str) -> bool {
        sender.send(text)
    }
}

impl Default for WsServer {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketPort for WsServer {
    fn start(&mut self, port: u16) -> Result<(), ServerError> {
        if self.started {
            return Ok(());
        }
        self.platform_start(port)?;
        self.started = true;
        Ok(())
    }

    fn service(&mut self) -> usize {
        let drained = self.inbound.swap(0, Ordering::Relaxed);
        if drained > 0 {
            debug!("WS: discarded {} inbound frame(s)", drained);
        }
        drained
    }

    fn client_count(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn broadcast_text(&mut self, text: &str) {
        // The httpd task takes the client lock on every handshake and
        // close, so sends run on cloned senders with the lock released.
        let targets: Vec<(i32, Sender)> = match self.clients.lock() {
            Ok(clients) => clients
                .iter()
                .map(|c| (c.session, c.sender.clone()))
                .collect(),
            Err(_) => return,
        };

        let mut failed = Vec::new();
        for (session, mut sender) in targets {
            if !Self::send(&mut sender, text) {
                warn!("WS: send to client {} failed, dropping", session);
                failed.push(session);
            }
        }
        if failed.is_empty() {
            return;
        }

        if let Ok(mut clients) = self.clients.lock() {
            let before = clients.len();
            clients.retain(|c| !failed.contains(&c.session));
            self.dropped = self
                .dropped
                .wrapping_add((before - clients.len()) as u32);
        }
    }
}
