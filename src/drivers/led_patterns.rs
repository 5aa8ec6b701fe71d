//! Status LED pattern engine.
//!
//! Produces the on/off level for the single status LED.  The main loop
//! calls `tick()` every iteration with the current time and writes the
//! result to the LED.
//!
//! ## Priority (highest first)
//!
//! 1. **Burst** — a queued run of `count` blinks signalling an event
//! 2. **Heartbeat** — square wave, fast while sampling, slow otherwise
//!
//! | Signal        | Shape              |
//! |---------------|--------------------|
//! | Sampling      | toggle every 200 ms |
//! | Idle          | toggle every 800 ms |
//! | BLE ready     | 3 × 120/120 ms     |
//! | OTA start     | 4 × 80/80 ms       |
//! | OTA success   | 2 × 160/160 ms     |
//! | OTA failure   | 5 × 80/80 ms       |

use heapless::Deque;

use crate::app::events::Burst;

/// Pending bursts beyond the active one.
const BURST_QUEUE_DEPTH: usize = 4;

#[derive(Debug, Clone, Copy)]
struct ActiveBurst {
    burst: Burst,
    /// Half-periods elapsed (even = on phase).
    step: u16,
    step_started_ms: u32,
}

/// LED pattern engine.  Stack-allocated, no heap.
pub struct LedPatternEngine {
    fast_ms: u32,
    slow_ms: u32,
    sampling: bool,
    level: bool,
    last_toggle_ms: u32,
    active: Option<ActiveBurst>,
    queued: Deque<Burst, BURST_QUEUE_DEPTH>,
}

impl LedPatternEngine {
    pub fn new(fast_ms: u32, slow_ms: u32) -> Self {
        Self {
            fast_ms,
            slow_ms,
            sampling: false,
            level: false,
            last_toggle_ms: 0,
            active: None,
            queued: Deque::new(),
        }
    }

    /// Select the heartbeat rate.
    pub fn set_sampling(&mut self, active: bool) {
        self.sampling = active;
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling
    }

    /// Queue a burst.  When the queue is full the new burst is dropped.
    pub fn push_burst(&mut self, burst: Burst) {
        if burst.count == 0 {
            return;
        }
        let _ = self.queued.push_back(burst);
    }

    pub fn burst_active(&self) -> bool {
        self.active.is_some() || !self.queued.is_empty()
    }

    /// Advance to `now_ms` and return the LED level.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        if self.active.is_none() {
            if let Some(burst) = self.queued.pop_front() {
                self.active = Some(ActiveBurst {
                    burst,
                    step: 0,
                    step_started_ms: now_ms,
                });
            }
        }

        if let Some(mut a) = self.active {
            loop {
                let on_phase = a.step % 2 == 0;
                let dur = if on_phase { a.burst.on_ms } else { a.burst.off_ms };
                if now_ms.wrapping_sub(a.step_started_ms) < dur {
                    break;
                }
                a.step_started_ms = a.step_started_ms.wrapping_add(dur);
                a.step += 1;
                if a.step >= u16::from(a.burst.count) * 2 {
                    break;
                }
            }
            if a.step >= u16::from(a.burst.count) * 2 {
                // Burst over: resume the heartbeat from a clean phase.
                self.active = None;
                self.level = false;
                self.last_toggle_ms = now_ms;
                return self.tick(now_ms);
            }
            self.active = Some(a);
            return a.step % 2 == 0;
        }

        let period = if self.sampling { self.fast_ms } else { self.slow_ms };
        if now_ms.wrapping_sub(self.last_toggle_ms) >= period {
            self.level = !self.level;
            self.last_toggle_ms = now_ms;
        }
        self.level
    }
}
