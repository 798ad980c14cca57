//! Inter-task channels and signals
//!
//! The tick counter is the only datum the tick task shares with the
//! control task; everything else moves through bounded channels.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use portable_atomic::AtomicU32;

use katabasis_core::config::{Config, Field};
use katabasis_core::state::MachineState;

/// Monotonically wrapping tick counter, incremented by the tick task.
pub static TICKS: AtomicU32 = AtomicU32::new(0);

/// Wakes the control task; the counter comparison decides whether a
/// pass actually runs.
pub static TICK_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Console requests into the control task.
pub static CONSOLE_REQ: Channel<CriticalSectionRawMutex, ConsoleRequest, 4> = Channel::new();

/// Control task replies back to the console task.
pub static CONSOLE_REPLY: Channel<CriticalSectionRawMutex, ConsoleReply, 4> = Channel::new();

/// Requests the console task forwards after PIN gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleRequest {
    Get(Field),
    Set(Field, u16),
    Status,
    Values,
    Raise,
    Lower,
}

impl ConsoleRequest {
    /// Whether the control task answers this request.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, ConsoleRequest::Raise | ConsoleRequest::Lower)
    }
}

/// Replies rendered into text by the console task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleReply {
    /// A field readback or set echo.
    Value(Field, u16),
    /// Machine status snapshot.
    Status {
        state: MachineState,
        fault: bool,
        decivolts: u16,
    },
    /// All tunables.
    Values(Config),
}
