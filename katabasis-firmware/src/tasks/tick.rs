//! Tick task
//!
//! The hardware timebase of the control loop. All it does is bump the
//! wrapping tick counter and wake the control task - deliberately no
//! other side effects, so the counter stays the only shared datum (the
//! interrupt-context discipline of the original relay board, kept
//! under embassy).

use defmt::*;
use embassy_time::{Duration, Ticker};
use portable_atomic::Ordering;

use crate::channels::{TICKS, TICK_SIGNAL};

/// Control tick period.
pub const TICK_PERIOD_MS: u64 = 10;

/// Tick task - advances the counter every period.
#[embassy_executor::task]
pub async fn tick_task() {
    info!("Tick task started");

    let mut ticker = Ticker::every(Duration::from_millis(TICK_PERIOD_MS));

    loop {
        ticker.next().await;
        TICKS.fetch_add(1, Ordering::Relaxed);
        TICK_SIGNAL.signal(());
    }
}
