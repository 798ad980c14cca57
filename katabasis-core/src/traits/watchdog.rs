//! Watchdog service trait

/// Acknowledge the hardware watchdog.
///
/// The watchdog is the only defense against software lockup: every
/// control-loop iteration must reach a `feed()` call, and any bounded
/// blocking step (the actuator settle wait, the boot-time drive
/// handshake) must keep feeding between slices.
pub trait WatchdogFeed {
    fn feed(&mut self);
}
