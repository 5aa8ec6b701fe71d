//! Radio event queue.
//!
//! The Wi-Fi driver invokes its event handler from the system event task,
//! a foreign context that must not touch credential, HTTP, or scheduler
//! state.  The handler only pushes a one-byte event code into this
//! lock-free ring; the main tick drains it and logs.
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ sys event task   │────▶│  RadioEvent  │────▶│  Main tick   │
//! │ (Wi-Fi handler)  │     │  ring (SPSC) │     │  (consumer)  │
//! └──────────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

/// Ring capacity.  Power of 2 for cheap modulo.
const EVENT_QUEUE_CAP: usize = 32;

/// Radio transitions worth a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RadioEvent {
    // ── Soft-AP side ──────────────────────────────────────
    ApStarted = 1,
    ApStopped = 2,
    /// A client associated with the soft-AP.
    ApClientJoined = 3,
    /// A client left the soft-AP.
    ApClientLeft = 4,
    ApProbeRequest = 5,

    // ── Station side ──────────────────────────────────────
    StaStarted = 10,
    StaConnected = 11,
    StaDisconnected = 12,
    StaGotIp = 13,
    ScanDone = 14,

    /// Any other driver event id (logged generically).
    Other = 0xFF,
}

impl RadioEvent {
    fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(Self::ApStarted),
            2 => Some(Self::ApStopped),
            3 => Some(Self::ApClientJoined),
            4 => Some(Self::ApClientLeft),
            5 => Some(Self::ApProbeRequest),
            10 => Some(Self::StaStarted),
            11 => Some(Self::StaConnected),
            12 => Some(Self::StaDisconnected),
            13 => Some(Self::StaGotIp),
            14 => Some(Self::ScanDone),
            0xFF => Some(Self::Other),
            _ => None,
        }
    }

    /// Human-readable description used by the tick logger.
    pub fn describe(self) -> &'static str {
        match self {
            Self::ApStarted => "AP started",
            Self::ApStopped => "AP stopped",
            Self::ApClientJoined => "Station connected to AP",
            Self::ApClientLeft => "Station disconnected from AP",
            Self::ApProbeRequest => "AP probe request received",
            Self::StaStarted => "STA started",
            Self::StaConnected => "STA associated",
            Self::StaDisconnected => "STA disconnected",
            Self::StaGotIp => "STA got IP",
            Self::ScanDone => "scan done",
            Self::Other => "other driver event",
        }
    }
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// Producer: the Wi-Fi event handler (one writer, system event task).
// Consumer: the main tick (one reader).  Slots are atomics so neither side
// needs `static mut`.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
static EVENT_DROPPED: AtomicU32 = AtomicU32::new(0);
static EVENT_SLOTS: [AtomicU8; EVENT_QUEUE_CAP] = [const { AtomicU8::new(0) }; EVENT_QUEUE_CAP];

/// Push an event.  Safe from any task; never blocks.
/// Returns `false` (and counts a drop) if the ring is full.
pub fn push_event(event: RadioEvent) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        EVENT_DROPPED.fetch_add(1, Ordering::Relaxed);
        return false;
    }

    EVENT_SLOTS[head as usize].store(event as u8, Ordering::Relaxed);
    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the oldest event.  Main tick only.
pub fn pop_event() -> Option<RadioEvent> {
    loop {
        let tail = EVENT_TAIL.load(Ordering::Relaxed);
        let head = EVENT_HEAD.load(Ordering::Acquire);

        if tail == head {
            return None;
        }

        let raw = EVENT_SLOTS[tail as usize].load(Ordering::Relaxed);
        EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

        // Unknown codes are skipped rather than ending the drain.
        if let Some(event) = RadioEvent::from_u8(raw) {
            return Some(event);
        }
    }
}

/// Drain all pending events into a callback, FIFO.
pub fn drain_events(mut handler: impl FnMut(RadioEvent)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

/// Events lost to a full ring since boot.
pub fn dropped_count() -> u32 {
    EVENT_DROPPED.load(Ordering::Relaxed)
}
