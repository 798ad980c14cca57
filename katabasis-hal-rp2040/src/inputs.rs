//! Trigger input port
//!
//! The three trigger switches pull their lines to ground through the
//! loom; the pins idle high on internal pull-ups. The kernel wants
//! active-high bits, so the port inverts here.

use embassy_rp::gpio::Input;

use katabasis_core::input::{TRIGGER_DOWN, TRIGGER_HOME, TRIGGER_UP};
use katabasis_core::traits::TriggerPort;

/// The home/up/down switch lines.
pub struct TriggerInputs<'d> {
    home: Input<'d>,
    up: Input<'d>,
    down: Input<'d>,
}

impl<'d> TriggerInputs<'d> {
    pub fn new(home: Input<'d>, up: Input<'d>, down: Input<'d>) -> Self {
        Self { home, up, down }
    }
}

impl TriggerPort for TriggerInputs<'_> {
    fn read(&mut self) -> u8 {
        let mut bits = 0;
        if self.home.is_low() {
            bits |= TRIGGER_HOME;
        }
        if self.up.is_low() {
            bits |= TRIGGER_UP;
        }
        if self.down.is_low() {
            bits |= TRIGGER_DOWN;
        }
        bits
    }
}
