//! BLE reconnect edge.
//!
//! The stack stops advertising when a central connects.  On the
//! connected → disconnected edge the main tick waits for the stack to
//! settle and restarts advertising once; any other transition only
//! updates the snapshot.

use log::info;

use crate::app::events::{AppEvent, EventQueue};
use crate::app::ports::{BlePort, ClockPort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEdge {
    None,
    Connected,
    Disconnected,
}

#[derive(Debug, Default)]
pub struct BleLink {
    was_connected: bool,
}

impl BleLink {
    pub const fn new() -> Self {
        Self {
            was_connected: false,
        }
    }

    /// Record `connected` and classify the transition.
    pub fn observe(&mut self, connected: bool) -> LinkEdge {
        let edge = match (self.was_connected, connected) {
            (true, false) => LinkEdge::Disconnected,
            (false, true) => LinkEdge::Connected,
            _ => LinkEdge::None,
        };
        self.was_connected = connected;
        edge
    }

    /// One scheduler step.  Returns `true` when advertising was restarted.
    pub fn service(
        &mut self,
        ble: &mut dyn BlePort,
        clock: &mut dyn ClockPort,
        settle_ms: u32,
        events: &mut EventQueue,
    ) -> bool {
        match self.observe(ble.is_connected()) {
            LinkEdge::Disconnected => {
                events.push(AppEvent::BleDisconnected);
                clock.delay_ms(settle_ms);
                ble.restart_advertising();
                info!("BLE: central left, advertising restarted");
                true
            }
            LinkEdge::Connected => {
                events.push(AppEvent::BleConnected);
                false
            }
            LinkEdge::None => false,
        }
    }
}
