//! Outbound application events.
//!
//! Handlers and boot steps push these into the [`EventQueue`]; the main
//! tick drains it into the [`EventSink`](super::ports::EventSink) port and
//! the LED burst overlay.  Nothing here blocks.

use heapless::Deque;

/// Queue depth.  One tick produces at most a handful of events.
const EVENT_QUEUE_DEPTH: usize = 16;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Boot sequence finished; carries the feature summary.
    Booted { wifi: bool, ble: bool },

    /// Soft-AP and servers are up.
    RadioReady,

    /// AP bring-up failed; networking is off this boot.
    RadioDead,

    /// Station outcome at boot.
    StationConnected { ssid: String },
    StationTimedOut,

    /// BLE stack advertising for the first time.
    BleReady,

    BleConnected,
    BleDisconnected,

    CredentialsSaved { ssid: String },
    CredentialsCleared,

    OtaStarted { max_size: u32 },
    OtaSucceeded { bytes: u32 },
    OtaFailed,

    /// A restart is pending after a committed response.
    RebootScheduled { in_ms: u32 },
}

/// LED burst shape: `count` pulses of `on_ms` on, `off_ms` off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    pub count: u8,
    pub on_ms: u32,
    pub off_ms: u32,
}

impl AppEvent {
    /// Blink pattern that signals this event, if any.
    pub const fn burst(&self) -> Option<Burst> {
        match self {
            Self::BleReady => Some(Burst { count: 3, on_ms: 120, off_ms: 120 }),
            Self::OtaStarted { .. } => Some(Burst { count: 4, on_ms: 80, off_ms: 80 }),
            Self::OtaSucceeded { .. } => Some(Burst { count: 2, on_ms: 160, off_ms: 160 }),
            Self::OtaFailed => Some(Burst { count: 5, on_ms: 80, off_ms: 80 }),
            _ => None,
        }
    }
}

/// Bounded FIFO of pending [`AppEvent`]s.
pub struct EventQueue {
    events: Deque<AppEvent, EVENT_QUEUE_DEPTH>,
    dropped: u32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            events: Deque::new(),
            dropped: 0,
        }
    }

    /// Enqueue; when full the oldest event is discarded.
    pub fn push(&mut self, event: AppEvent) {
        if self.events.is_full() {
            let _ = self.events.pop_front();
            self.dropped = self.dropped.wrapping_add(1);
        }
        let _ = self.events.push_back(event);
    }

    pub fn pop(&mut self) -> Option<AppEvent> {
        self.events.pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
