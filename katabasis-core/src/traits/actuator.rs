//! Actuator output trait
//!
//! The kernel sequences the gate through discrete "begin moving" /
//! "begin stopped" commands. Everything below that - relay ordering,
//! control-voltage ramping, the settle wait after power-down - belongs
//! to the driver implementing this trait.

/// Direction of gate travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Toward the home position (winch in)
    Raise,
    /// Away from home, toward P1/P2 (winch out)
    Lower,
}

/// Commands accepted by the actuator collaborator.
///
/// Contract the implementation must keep: direction is selected before
/// power is applied, and on stop the power path is opened before the
/// direction relays are released, with a settle delay in between.
/// Violating that order exposes the motor drive to shoot-through.
pub trait ActuatorOutput {
    /// Begin moving in the given direction.
    fn begin_move(&mut self, dir: Direction);

    /// Begin the stop sequence.
    ///
    /// May block for the bounded settle wait; implementations must keep
    /// servicing the watchdog while they do (see [`super::WatchdogFeed`]).
    fn begin_stop(&mut self);
}
