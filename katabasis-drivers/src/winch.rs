//! Winch drive sequencer
//!
//! The gate motor hangs off a brushed drive with four relays and two
//! analog control voltages:
//!
//! - R_FWD / R_REV select direction (lower / raise)
//! - R_THR connects the throttle CV to the drive's speed input
//! - R_BRK connects the brake CV
//!
//! Sequencing rules this driver enforces:
//!
//! - Direction is selected before any power path closes. Swapping the
//!   direction relays under load arcs the contacts.
//! - On stop, the throttle CV drops and its relay opens before the
//!   brake path closes, then a bounded settle wait lets the drum roll
//!   down before the direction relays release. The wait is chunked and
//!   the watchdog fed between chunks.

use embedded_hal::delay::DelayNs;

use katabasis_core::traits::{ActuatorOutput, Direction, WatchdogFeed};

/// Trait for relay output abstraction
pub trait RelayPin {
    /// Close the relay
    fn set_high(&mut self);

    /// Open the relay
    fn set_low(&mut self);
}

/// Trait for an 8-bit analog control voltage (PWM + RC on the board)
pub trait ControlVoltage {
    /// Set the output level, 0-255.
    fn set_level(&mut self, level: u8);
}

/// Winch sequencing parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WinchConfig {
    /// Throttle CV while moving (0-255)
    pub throttle_cv: u8,
    /// Brake CV while stopped (0-255)
    pub brake_cv: u8,
    /// Roll-down settle after power-down, ms
    pub settle_ms: u32,
    /// Settle chunk between watchdog feeds, ms
    pub settle_slice_ms: u32,
}

impl Default for WinchConfig {
    fn default() -> Self {
        Self {
            throttle_cv: 255,
            brake_cv: 0,
            settle_ms: 250,
            settle_slice_ms: 25,
        }
    }
}

/// Relay/CV winch drive.
pub struct Winch<P, C, D, W> {
    forward: P,
    reverse: P,
    throttle_sw: P,
    brake_sw: P,
    throttle: C,
    brake: C,
    delay: D,
    watchdog: W,
    config: WinchConfig,
    moving: bool,
}

impl<P, C, D, W> Winch<P, C, D, W>
where
    P: RelayPin,
    C: ControlVoltage,
    D: DelayNs,
    W: WatchdogFeed,
{
    /// Create the drive with everything open and the CVs at zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut forward: P,
        mut reverse: P,
        mut throttle_sw: P,
        mut brake_sw: P,
        mut throttle: C,
        mut brake: C,
        delay: D,
        watchdog: W,
        config: WinchConfig,
    ) -> Self {
        forward.set_low();
        reverse.set_low();
        throttle_sw.set_low();
        brake_sw.set_low();
        throttle.set_level(0);
        brake.set_level(0);
        Self {
            forward,
            reverse,
            throttle_sw,
            brake_sw,
            throttle,
            brake,
            delay,
            watchdog,
            config,
            moving: false,
        }
    }

    /// Whether a move is in progress.
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Live throttle CV update (console tuning while moving).
    pub fn set_throttle_cv(&mut self, level: u8) {
        self.config.throttle_cv = level;
        if self.moving {
            self.throttle.set_level(level);
        }
    }

    /// Feed the watchdog. The control loop calls this once per
    /// iteration regardless of branch.
    pub fn service_watchdog(&mut self) {
        self.watchdog.feed();
    }
}

impl<P, C, D, W> ActuatorOutput for Winch<P, C, D, W>
where
    P: RelayPin,
    C: ControlVoltage,
    D: DelayNs,
    W: WatchdogFeed,
{
    fn begin_move(&mut self, dir: Direction) {
        // Direction first
        match dir {
            Direction::Raise => {
                self.forward.set_low();
                self.reverse.set_high();
            }
            Direction::Lower => {
                self.reverse.set_low();
                self.forward.set_high();
            }
        }
        // Release the brake path, then power
        self.brake.set_level(0);
        self.brake_sw.set_low();
        self.throttle_sw.set_high();
        self.throttle.set_level(self.config.throttle_cv);
        self.moving = true;
    }

    fn begin_stop(&mut self) {
        // Power down before anything else switches
        self.throttle.set_level(0);
        self.throttle_sw.set_low();
        self.brake_sw.set_high();
        self.brake.set_level(self.config.brake_cv);

        // Roll-down settle, watchdog fed every slice
        let mut remaining = self.config.settle_ms;
        while remaining > 0 {
            let slice = remaining.min(self.config.settle_slice_ms.max(1));
            self.delay.delay_ms(slice);
            self.watchdog.feed();
            remaining -= slice;
        }

        // Direction released only once the drum has settled
        self.forward.set_low();
        self.reverse.set_low();
        self.moving = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use heapless::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ev {
        Relay(&'static str, bool),
        Cv(&'static str, u8),
        Wait(u32),
        Feed,
    }

    #[derive(Default)]
    struct Log {
        events: RefCell<Vec<Ev, 128>>,
    }

    impl Log {
        fn push(&self, ev: Ev) {
            let _ = self.events.borrow_mut().push(ev);
        }

        fn position(&self, ev: Ev) -> usize {
            self.events
                .borrow()
                .iter()
                .position(|e| *e == ev)
                .unwrap_or_else(|| panic!("event {:?} not recorded", ev))
        }

        fn count(&self, pred: impl Fn(&Ev) -> bool) -> usize {
            self.events.borrow().iter().filter(|e| pred(e)).count()
        }
    }

    struct MockRelay<'a> {
        name: &'static str,
        log: &'a Log,
    }

    impl RelayPin for MockRelay<'_> {
        fn set_high(&mut self) {
            self.log.push(Ev::Relay(self.name, true));
        }

        fn set_low(&mut self) {
            self.log.push(Ev::Relay(self.name, false));
        }
    }

    struct MockCv<'a> {
        name: &'static str,
        log: &'a Log,
    }

    impl ControlVoltage for MockCv<'_> {
        fn set_level(&mut self, level: u8) {
            self.log.push(Ev::Cv(self.name, level));
        }
    }

    struct MockDelay<'a> {
        log: &'a Log,
    }

    impl DelayNs for MockDelay<'_> {
        fn delay_ns(&mut self, ns: u32) {
            self.log.push(Ev::Wait(ns / 1_000_000));
        }

        fn delay_ms(&mut self, ms: u32) {
            self.log.push(Ev::Wait(ms));
        }
    }

    struct MockWatchdog<'a> {
        log: &'a Log,
    }

    impl WatchdogFeed for MockWatchdog<'_> {
        fn feed(&mut self) {
            self.log.push(Ev::Feed);
        }
    }

    fn build<'a>(
        log: &'a Log,
        config: WinchConfig,
    ) -> Winch<MockRelay<'a>, MockCv<'a>, MockDelay<'a>, MockWatchdog<'a>> {
        Winch::new(
            MockRelay { name: "fwd", log },
            MockRelay { name: "rev", log },
            MockRelay { name: "thr_sw", log },
            MockRelay { name: "brk_sw", log },
            MockCv { name: "thr", log },
            MockCv { name: "brk", log },
            MockDelay { log },
            MockWatchdog { log },
            config,
        )
    }

    #[test]
    fn construction_leaves_everything_open() {
        let log = Log::default();
        let winch = build(&log, WinchConfig::default());
        assert!(!winch.is_moving());
        assert_eq!(log.count(|e| matches!(e, Ev::Relay(_, true))), 0);
        assert_eq!(log.count(|e| matches!(e, Ev::Cv(_, l) if *l > 0)), 0);
    }

    #[test]
    fn move_selects_direction_before_power() {
        let log = Log::default();
        let mut winch = build(&log, WinchConfig::default());
        log.events.borrow_mut().clear();

        winch.begin_move(Direction::Lower);
        assert!(winch.is_moving());

        let dir = log.position(Ev::Relay("fwd", true));
        let power = log.position(Ev::Relay("thr_sw", true));
        let cv = log.position(Ev::Cv("thr", 255));
        assert!(dir < power, "direction relay must close before power");
        assert!(power < cv, "power path before the CV rises");
    }

    #[test]
    fn raise_uses_reverse_relay() {
        let log = Log::default();
        let mut winch = build(&log, WinchConfig::default());
        log.events.borrow_mut().clear();

        winch.begin_move(Direction::Raise);
        log.position(Ev::Relay("rev", true));
        log.position(Ev::Relay("fwd", false));
    }

    #[test]
    fn stop_powers_down_then_settles_then_releases_direction() {
        let log = Log::default();
        let mut winch = build(
            &log,
            WinchConfig {
                brake_cv: 40,
                ..WinchConfig::default()
            },
        );
        winch.begin_move(Direction::Lower);
        log.events.borrow_mut().clear();

        winch.begin_stop();
        assert!(!winch.is_moving());

        let throttle_down = log.position(Ev::Cv("thr", 0));
        let throttle_open = log.position(Ev::Relay("thr_sw", false));
        let brake_close = log.position(Ev::Relay("brk_sw", true));
        let brake_cv = log.position(Ev::Cv("brk", 40));
        let fwd_release = log.position(Ev::Relay("fwd", false));

        assert!(throttle_down < throttle_open);
        assert!(throttle_open < brake_close);
        assert!(brake_close < brake_cv);
        assert!(
            brake_cv < fwd_release,
            "direction must hold until after the settle wait"
        );
        // Settle happened between brake engage and direction release
        let first_wait = log.position(Ev::Wait(25));
        assert!(brake_cv < first_wait && first_wait < fwd_release);
    }

    #[test]
    fn settle_wait_keeps_the_watchdog_fed() {
        let log = Log::default();
        let mut winch = build(
            &log,
            WinchConfig {
                settle_ms: 250,
                settle_slice_ms: 25,
                ..WinchConfig::default()
            },
        );
        winch.begin_move(Direction::Raise);
        log.events.borrow_mut().clear();

        winch.begin_stop();

        let waited: u32 = log
            .events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Ev::Wait(ms) => Some(*ms),
                _ => None,
            })
            .sum();
        assert_eq!(waited, 250);
        assert_eq!(log.count(|e| matches!(e, Ev::Feed)), 10);
    }

    #[test]
    fn odd_settle_remainder_still_covered() {
        let log = Log::default();
        let mut winch = build(
            &log,
            WinchConfig {
                settle_ms: 60,
                settle_slice_ms: 25,
                ..WinchConfig::default()
            },
        );
        winch.begin_stop();
        let waited: u32 = log
            .events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                Ev::Wait(ms) => Some(*ms),
                _ => None,
            })
            .sum();
        assert_eq!(waited, 60);
        assert_eq!(log.count(|e| matches!(e, Ev::Feed)), 3);
    }

    #[test]
    fn live_throttle_update_only_while_moving() {
        let log = Log::default();
        let mut winch = build(&log, WinchConfig::default());
        log.events.borrow_mut().clear();

        winch.set_throttle_cv(128);
        assert_eq!(log.count(|e| matches!(e, Ev::Cv("thr", 128))), 0);

        winch.begin_move(Direction::Lower);
        winch.set_throttle_cv(99);
        assert_eq!(log.count(|e| matches!(e, Ev::Cv("thr", 99))), 1);
    }
}
