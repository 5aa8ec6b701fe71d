//! Shared-state mock adapters for integration tests.
//!
//! Every mock keeps its state behind an `Rc<RefCell<_>>` handle so the test
//! can keep a clone after the mock has been boxed into the [`Device`], and
//! so storage can survive a simulated reboot.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, ErrorKind, Read, Write};
use std::net::Ipv4Addr;
use std::rc::Rc;

use cardinal_grip::app::espota::{CMD_FLASH, Invitation, Md5Hex};
use cardinal_grip::app::events::AppEvent;
use cardinal_grip::app::http::{HttpReply, HttpRequest, Method, PostAction};
use cardinal_grip::app::ports::{
    AdcPort, BlePort, ClockPort, EventSink, FlashWriterPort, HttpHandler, HttpServerPort,
    ImageStream, LedPort, MdnsPort, MdnsService, NetUpdatePort, PartitionInfo, PartitionKind,
    RadioMode, RadioPort, ScanEntry, SerialPort, StationStatus, StorageError, StoragePort,
    SystemPort, WebSocketPort,
};
use cardinal_grip::config::{
    BleConfig, DefaultCredentials, FeatureFlags, FirmwareConfig, NetworkConfig,
    WIFI_PLACEHOLDER_PASSWORD, WIFI_PLACEHOLDER_SSID,
};
use cardinal_grip::device::{Device, Ports};
use cardinal_grip::error::{BleError, FlashError, RadioError, ServerError};
use cardinal_grip::scheduler::{MainLoop, TickReport};

// ── Clock ─────────────────────────────────────────────────────

/// Virtual clock; `delay_ms` advances time instantly.
#[derive(Clone, Default)]
pub struct MockClock {
    pub now: Rc<Cell<u32>>,
    pub delays: Rc<RefCell<Vec<u32>>>,
}

impl ClockPort for MockClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.borrow_mut().push(ms);
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

// ── System ────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockSystem {
    pub restarts: Rc<Cell<u32>>,
    pub marked_valid: Rc<Cell<bool>>,
}

impl SystemPort for MockSystem {
    fn restart(&mut self) {
        self.restarts.set(self.restarts.get() + 1);
    }

    fn mark_running_image_valid(&mut self) {
        self.marked_valid.set(true);
    }

    fn partitions(&self) -> Vec<PartitionInfo> {
        vec![
            PartitionInfo {
                label: "ota_0".into(),
                kind: PartitionKind::App,
                subtype: 0x10,
                address: 0x1_0000,
                size: 0x18_0000,
            },
            PartitionInfo {
                label: "nvs".into(),
                kind: PartitionKind::Data,
                subtype: 0x02,
                address: 0x9000,
                size: 0x6000,
            },
        ]
    }
}

// ── ADC / serial / LED / sink ─────────────────────────────────

#[derive(Clone, Default)]
pub struct MockAdc {
    pub values: Rc<RefCell<[u16; 4]>>,
}

impl AdcPort for MockAdc {
    fn read(&mut self, channel: usize) -> u16 {
        self.values.borrow().get(channel).copied().unwrap_or(0)
    }
}

#[derive(Clone, Default)]
pub struct MockSerial {
    pub lines: Rc<RefCell<Vec<String>>>,
}

impl SerialPort for MockSerial {
    fn write_line(&mut self, line: &str) {
        self.lines.borrow_mut().push(line.to_owned());
    }
}

#[derive(Clone, Default)]
pub struct MockLed {
    pub levels: Rc<RefCell<Vec<bool>>>,
}

impl LedPort for MockLed {
    fn set(&mut self, on: bool) {
        self.levels.borrow_mut().push(on);
    }
}

#[derive(Clone, Default)]
pub struct MockSink {
    pub events: Rc<RefCell<Vec<AppEvent>>>,
}

impl MockSink {
    pub fn count(&self, event: &AppEvent) -> usize {
        self.events.borrow().iter().filter(|e| *e == event).count()
    }
}

impl EventSink for MockSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

// ── Storage ───────────────────────────────────────────────────

/// Namespaced string store.  Clone the handle into a second rig to model
/// a reboot.
#[derive(Clone, Default)]
pub struct MockStorage {
    pub data: Rc<RefCell<HashMap<String, HashMap<String, String>>>>,
    pub fail_writes: Rc<Cell<bool>>,
}

impl MockStorage {
    pub fn value(&self, ns: &str, key: &str) -> Option<String> {
        self.data.borrow().get(ns).and_then(|m| m.get(key).cloned())
    }
}

impl StoragePort for MockStorage {
    fn get_str(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .data
            .borrow()
            .get(namespace)
            .and_then(|m| m.get(key).cloned()))
    }

    fn set_strs(&mut self, namespace: &str, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::IoError);
        }
        let mut data = self.data.borrow_mut();
        let ns = data.entry(namespace.to_owned()).or_default();
        for (k, v) in entries {
            ns.insert((*k).to_owned(), (*v).to_owned());
        }
        Ok(())
    }

    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        self.data.borrow_mut().remove(namespace);
        Ok(())
    }
}

// ── Radio / mDNS ──────────────────────────────────────────────

#[derive(Default)]
pub struct RadioState {
    pub mode: Option<RadioMode>,
    pub ap_up: bool,
    pub ap_fails: bool,
    /// SSID that accepts the station.
    pub reachable: Option<String>,
    pub attempts: Vec<(String, String)>,
    pub connected: Option<String>,
}

#[derive(Clone, Default)]
pub struct MockRadio {
    pub state: Rc<RefCell<RadioState>>,
}

impl RadioPort for MockRadio {
    fn reset(&mut self) -> Result<(), RadioError> {
        let mut s = self.state.borrow_mut();
        s.mode = Some(RadioMode::ApStation);
        s.connected = None;
        Ok(())
    }

    fn start_ap(&mut self, _network: &NetworkConfig) -> Result<(), RadioError> {
        let mut s = self.state.borrow_mut();
        if s.ap_fails {
            return Err(RadioError::ApStartFailed);
        }
        s.ap_up = true;
        Ok(())
    }

    fn begin_station(&mut self, ssid: &str, password: &str) -> Result<(), RadioError> {
        let mut s = self.state.borrow_mut();
        s.attempts.push((ssid.to_owned(), password.to_owned()));
        if s.reachable.as_deref() == Some(ssid) {
            s.connected = Some(ssid.to_owned());
        }
        Ok(())
    }

    fn station_status(&mut self) -> StationStatus {
        let s = self.state.borrow();
        match (&s.connected, s.attempts.is_empty()) {
            (Some(_), _) => StationStatus::Connected,
            (None, true) => StationStatus::Idle,
            (None, false) => StationStatus::Connecting,
        }
    }

    fn mode(&self) -> RadioMode {
        self.state.borrow().mode.unwrap_or(RadioMode::Off)
    }

    fn station_ssid(&self) -> Option<String> {
        self.state.borrow().connected.clone()
    }

    fn station_ip(&self) -> Option<Ipv4Addr> {
        self.state
            .borrow()
            .connected
            .as_ref()
            .map(|_| Ipv4Addr::new(192, 168, 1, 50))
    }

    fn ap_ip(&self) -> Option<Ipv4Addr> {
        self.state
            .borrow()
            .ap_up
            .then_some(Ipv4Addr::new(192, 168, 4, 1))
    }

    fn scan(&mut self) -> Result<Vec<ScanEntry>, RadioError> {
        Ok(vec![ScanEntry {
            ssid: "Lab<5G>".into(),
            rssi: -55,
            secure: true,
        }])
    }
}

#[derive(Clone, Default)]
pub struct MockMdns {
    pub registrations: Rc<RefCell<Vec<(String, Vec<MdnsService>)>>>,
}

impl MdnsPort for MockMdns {
    fn start(
        &mut self,
        hostname: &str,
        _instance: &str,
        services: &[MdnsService],
    ) -> Result<(), RadioError> {
        self.registrations
            .borrow_mut()
            .push((hostname.to_owned(), services.to_vec()));
        Ok(())
    }
}

// ── WebSocket / BLE ───────────────────────────────────────────

#[derive(Default)]
pub struct WsState {
    pub port: Option<u16>,
    pub clients: usize,
    pub frames: Vec<String>,
    pub inbound: usize,
}

#[derive(Clone, Default)]
pub struct MockWs {
    pub state: Rc<RefCell<WsState>>,
}

impl WebSocketPort for MockWs {
    fn start(&mut self, port: u16) -> Result<(), ServerError> {
        self.state.borrow_mut().port = Some(port);
        Ok(())
    }

    fn service(&mut self) -> usize {
        std::mem::take(&mut self.state.borrow_mut().inbound)
    }

    fn client_count(&self) -> usize {
        self.state.borrow().clients
    }

    fn broadcast_text(&mut self, text: &str) {
        self.state.borrow_mut().frames.push(text.to_owned());
    }
}

#[derive(Default)]
pub struct BleState {
    pub init_fails: bool,
    pub initialized: bool,
    pub connected: bool,
    pub notifications: Vec<Vec<u8>>,
    pub readvertised: u32,
}

#[derive(Clone, Default)]
pub struct MockBle {
    pub state: Rc<RefCell<BleState>>,
}

impl BlePort for MockBle {
    fn init(&mut self, _config: &BleConfig) -> Result<(), BleError> {
        let mut s = self.state.borrow_mut();
        if s.init_fails {
            return Err(BleError::StackInitFailed(-1));
        }
        s.initialized = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn has_characteristic(&self) -> bool {
        self.state.borrow().initialized
    }

    fn notify(&mut self, payload: &[u8]) {
        self.state.borrow_mut().notifications.push(payload.to_vec());
    }

    fn restart_advertising(&mut self) {
        self.state.borrow_mut().readvertised += 1;
    }
}

// ── HTTP ──────────────────────────────────────────────────────

pub struct ScriptedRequest {
    pub method: Method,
    pub target: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Connection resets after this many body bytes.
    pub reset_after: Option<usize>,
}

/// Body tail of a client that went away.
struct ResetByPeer;

impl Read for ResetByPeer {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::from(ErrorKind::ConnectionReset))
    }
}

#[derive(Default)]
pub struct HttpState {
    pub port: Option<u16>,
    pub pending: VecDeque<ScriptedRequest>,
    pub replies: Vec<HttpReply>,
}

/// Serves requests queued by the test, one per poll.
#[derive(Clone, Default)]
pub struct MockHttp {
    pub state: Rc<RefCell<HttpState>>,
}

impl MockHttp {
    pub fn get(&self, target: &str) {
        self.push(Method::Get, target, None, Vec::new());
    }

    pub fn post_form(&self, target: &str, body: &str) {
        self.push(
            Method::Post,
            target,
            Some("application/x-www-form-urlencoded"),
            body.as_bytes().to_vec(),
        );
    }

    pub fn push(&self, method: Method, target: &str, content_type: Option<&str>, body: Vec<u8>) {
        self.state.borrow_mut().pending.push_back(ScriptedRequest {
            method,
            target: target.to_owned(),
            content_type: content_type.map(str::to_owned),
            body,
            reset_after: None,
        });
    }

    /// Queue a POST whose client disconnects after `after` body bytes.
    pub fn push_reset(&self, target: &str, content_type: &str, body: Vec<u8>, after: usize) {
        self.state.borrow_mut().pending.push_back(ScriptedRequest {
            method: Method::Post,
            target: target.to_owned(),
            content_type: Some(content_type.to_owned()),
            body,
            reset_after: Some(after),
        });
    }

    pub fn last_reply(&self) -> Option<HttpReply> {
        self.state.borrow().replies.last().cloned()
    }

    pub fn replies(&self) -> usize {
        self.state.borrow().replies.len()
    }
}

impl HttpServerPort for MockHttp {
    fn start(&mut self, port: u16) -> Result<(), ServerError> {
        self.state.borrow_mut().port = Some(port);
        Ok(())
    }

    fn poll(&mut self, handler: &mut dyn HttpHandler) -> Option<PostAction> {
        let next = self.state.borrow_mut().pending.pop_front()?;
        let (path, query) = HttpRequest::split_target(&next.target);
        let mut body: Box<dyn Read> = match next.reset_after {
            Some(after) => {
                let sent = next.body[..after.min(next.body.len())].to_vec();
                Box::new(Cursor::new(sent).chain(ResetByPeer))
            }
            None => Box::new(Cursor::new(next.body.clone())),
        };
        let mut request = HttpRequest {
            method: next.method,
            path,
            query,
            content_type: next.content_type.as_deref(),
            body: &mut body,
        };
        let reply = handler.handle(&mut request);
        let after = reply.after;
        self.state.borrow_mut().replies.push(reply);
        after
    }
}

// ── Network upload ────────────────────────────────────────────

#[derive(Default)]
pub struct NetUpdateState {
    pub port: Option<u16>,
    /// Invitations with the image each uploader will send.
    pub pending: VecDeque<(Invitation, Vec<u8>)>,
    /// Image for the connection that follows the last invitation.
    pub image: Option<Vec<u8>>,
    pub connects: u32,
    /// Everything the device wrote on data connections.
    pub replies: Rc<RefCell<Vec<u8>>>,
}

/// In-memory data connection.
struct LoopbackUpload {
    image: Cursor<Vec<u8>>,
    replies: Rc<RefCell<Vec<u8>>>,
}

impl Read for LoopbackUpload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.image.read(buf)
    }
}

impl Write for LoopbackUpload {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.replies.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockNetUpdate {
    pub state: Rc<RefCell<NetUpdateState>>,
}

impl MockNetUpdate {
    /// Queue an invitation for `image` carrying digest `md5`.
    pub fn invite(&self, image: Vec<u8>, md5: Md5Hex) {
        let invitation = Invitation {
            command: CMD_FLASH,
            data_port: 47_000,
            size: image.len() as u32,
            md5,
        };
        self.state.borrow_mut().pending.push_back((invitation, image));
    }

    pub fn replies(&self) -> String {
        String::from_utf8_lossy(&self.state.borrow().replies.borrow()).into_owned()
    }
}

impl NetUpdatePort for MockNetUpdate {
    fn start(&mut self, port: u16) -> Result<(), ServerError> {
        self.state.borrow_mut().port = Some(port);
        Ok(())
    }

    fn poll_invitation(&mut self) -> Option<Invitation> {
        let mut s = self.state.borrow_mut();
        s.port?;
        let (invitation, image) = s.pending.pop_front()?;
        s.image = Some(image);
        Some(invitation)
    }

    fn connect(&mut self, _invite: &Invitation) -> Result<Box<dyn ImageStream>, ServerError> {
        let mut s = self.state.borrow_mut();
        s.connects += 1;
        let image = s.image.take().ok_or(ServerError::ConnectFailed)?;
        Ok(Box::new(LoopbackUpload {
            image: Cursor::new(image),
            replies: Rc::clone(&s.replies),
        }))
    }
}

// ── Flash ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct FlashState {
    pub capacity: u32,
    pub max: u32,
    pub buffer: Vec<u8>,
    pub open: bool,
    pub committed: Option<Vec<u8>>,
    pub aborts: u32,
}

#[derive(Clone)]
pub struct MockFlash {
    pub state: Rc<RefCell<FlashState>>,
}

impl MockFlash {
    pub fn new(capacity: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(FlashState {
                capacity,
                ..Default::default()
            })),
        }
    }
}

impl FlashWriterPort for MockFlash {
    fn free_space(&self) -> u32 {
        self.state.borrow().capacity
    }

    fn begin(&mut self, max_size: u32) -> Result<(), FlashError> {
        let mut s = self.state.borrow_mut();
        if max_size == 0 {
            return Err(FlashError::NoPartition);
        }
        s.max = max_size;
        s.buffer.clear();
        s.open = true;
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> usize {
        let mut s = self.state.borrow_mut();
        if !s.open {
            return 0;
        }
        let room = (s.max as usize).saturating_sub(s.buffer.len());
        let n = chunk.len().min(room);
        s.buffer.extend_from_slice(&chunk[..n]);
        n
    }

    fn end(&mut self) -> Result<u32, FlashError> {
        let mut s = self.state.borrow_mut();
        if !s.open {
            return Err(FlashError::NotOpen);
        }
        s.open = false;
        let image = std::mem::take(&mut s.buffer);
        let len = image.len() as u32;
        s.committed = Some(image);
        Ok(len)
    }

    fn abort(&mut self) {
        let mut s = self.state.borrow_mut();
        s.open = false;
        s.buffer.clear();
        s.aborts += 1;
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Handles to every mock behind a [`Device`].
#[derive(Clone)]
pub struct Rig {
    pub clock: MockClock,
    pub system: MockSystem,
    pub adc: MockAdc,
    pub serial: MockSerial,
    pub ws: MockWs,
    pub ble: MockBle,
    pub http: MockHttp,
    pub net: MockNetUpdate,
    pub flash: MockFlash,
    pub led: MockLed,
    pub storage: MockStorage,
    pub radio: MockRadio,
    pub mdns: MockMdns,
    pub sink: MockSink,
}

pub const FLASH_CAPACITY: u32 = 0x2_0000;

impl Rig {
    pub fn new() -> Self {
        Self::with_storage(MockStorage::default())
    }

    /// Fresh hardware around existing persistent storage (a reboot).
    pub fn with_storage(storage: MockStorage) -> Self {
        Self {
            clock: MockClock::default(),
            system: MockSystem::default(),
            adc: MockAdc::default(),
            serial: MockSerial::default(),
            ws: MockWs::default(),
            ble: MockBle::default(),
            http: MockHttp::default(),
            net: MockNetUpdate::default(),
            flash: MockFlash::new(FLASH_CAPACITY),
            led: MockLed::default(),
            storage,
            radio: MockRadio::default(),
            mdns: MockMdns::default(),
            sink: MockSink::default(),
        }
    }

    pub fn placeholder_defaults() -> DefaultCredentials {
        DefaultCredentials {
            ssid: WIFI_PLACEHOLDER_SSID,
            password: WIFI_PLACEHOLDER_PASSWORD,
        }
    }

    pub fn device(&self) -> Device {
        self.device_with(FeatureFlags::all(), Self::placeholder_defaults())
    }

    pub fn device_with(&self, features: FeatureFlags, defaults: DefaultCredentials) -> Device {
        Device::new(FirmwareConfig::default(), features, defaults, self.ports())
    }

    /// One boxed handle per mock; tests may replace single ports.
    pub fn ports(&self) -> Ports {
        Ports {
            clock: Box::new(self.clock.clone()),
            system: Box::new(self.system.clone()),
            adc: Box::new(self.adc.clone()),
            serial: Some(Box::new(self.serial.clone())),
            ws: Box::new(self.ws.clone()),
            ble: Box::new(self.ble.clone()),
            http: Box::new(self.http.clone()),
            net_update: Box::new(self.net.clone()),
            flash: Box::new(self.flash.clone()),
            led: Box::new(self.led.clone()),
            storage: Box::new(self.storage.clone()),
            radio: Box::new(self.radio.clone()),
            mdns: Box::new(self.mdns.clone()),
            sink: Box::new(self.sink.clone()),
        }
    }

    /// Boot a device and clear the boot-time serial dump.
    pub fn booted(&self) -> Device {
        let mut dev = self.device();
        dev.boot();
        self.serial.lines.borrow_mut().clear();
        dev
    }
}

/// Tick until `done` holds or `max_ticks` run out.  Returns the number of
/// ticks taken, or `None` on timeout.
pub fn tick_until(
    main: &mut MainLoop,
    dev: &mut Device,
    max_ticks: usize,
    mut done: impl FnMut(&TickReport) -> bool,
) -> Option<usize> {
    for n in 1..=max_ticks {
        let report = main.tick(dev);
        if done(&report) {
            return Some(n);
        }
    }
    None
}
