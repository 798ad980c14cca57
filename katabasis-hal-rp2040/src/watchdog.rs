//! Hardware watchdog
//!
//! Started once at boot and never stopped; a missed feed resets the
//! chip. Boot deliberately spins without feeding when the drive-unit
//! check decides the system must not enter the control loop.

use embassy_rp::peripherals::WATCHDOG;
use embassy_rp::watchdog::Watchdog;
use embassy_time::Duration;

use katabasis_core::traits::WatchdogFeed;

/// Reset after this long without a feed.
pub const WATCHDOG_TIMEOUT_MS: u64 = 5_000;

/// The running hardware watchdog.
pub struct HardwareWatchdog {
    inner: Watchdog,
}

impl HardwareWatchdog {
    /// Take the peripheral and start the countdown.
    pub fn start(peripheral: WATCHDOG) -> Self {
        let mut inner = Watchdog::new(peripheral);
        inner.start(Duration::from_millis(WATCHDOG_TIMEOUT_MS));
        Self { inner }
    }
}

impl WatchdogFeed for HardwareWatchdog {
    fn feed(&mut self) {
        self.inner.feed();
    }
}
