//! The motion controller
//!
//! Holds the machine state and every per-state timer, and dispatches
//! the two event sources - debounced trigger edges and the per-tick
//! timeout pass - into transitions. Actuator sequencing is invoked
//! through [`ActuatorOutput`] as opaque begin-move/begin-stop
//! primitives; transitions are synchronous and complete within the
//! tick that triggers them.

use crate::config::{Config, Field};
use crate::input::{TRIGGER_DOWN, TRIGGER_HOME, TRIGGER_MASK, TRIGGER_UP};
use crate::prng::Prng;
use crate::safety::BatteryMonitor;
use crate::schedule;
use crate::state::{MachineState, Trigger};
use crate::traits::{ActuatorOutput, Direction};

/// Control passes per minute (10ms tick).
pub const TICKS_PER_MINUTE: u32 = 6_000;
/// Home-switch noise grace just after leaving home: a cord brushing the
/// switch inside this window is ignored rather than faulted (0.5s).
pub const HOME_NOISE_GRACE_TICKS: u32 = 50;
/// Maximum minutes the gate may sit parked away from home before it is
/// retracted regardless of triggers.
pub const SAFE_TIME_MINUTES: u16 = 120;

/// The control context: one instance, owned by the tick-dispatch loop,
/// alive until power loss.
pub struct Controller {
    state: MachineState,
    fault: bool,
    config: Config,
    battery: BatteryMonitor,
    prng: Prng,
    /// Elapsed ticks on the Home->P1 leg. Preserved across a
    /// Stop<->Move pair so pausing does not lose progress; reset only
    /// when the leg restarts from AtHome.
    elapsed_p1: u16,
    /// Elapsed ticks on the P1->P2 leg; same preservation rule.
    elapsed_p2: u16,
    /// Ticks since the last state change.
    state_ticks: u32,
    /// Whole minutes since the last state change.
    state_minutes: u16,
    /// Free-running tick accumulator feeding `state_minutes`;
    /// deliberately not reset on transitions.
    minute_acc: u32,
    /// Home re-seat window; reset by a home re-assert without
    /// disturbing the feed wait.
    retry_ticks: u32,
    /// Minutes at home until the next scheduled feed (0 = none).
    next_feed_due_min: u16,
}

impl Controller {
    /// Create the controller in the boot state.
    pub fn new(config: Config, seed: u32) -> Self {
        Self {
            state: MachineState::Stopped,
            fault: false,
            config,
            battery: BatteryMonitor::new(),
            prng: Prng::seeded(seed),
            elapsed_p1: 0,
            elapsed_p2: 0,
            state_ticks: 0,
            state_minutes: 0,
            minute_acc: 0,
            retry_ticks: 0,
            next_feed_due_min: 0,
        }
    }

    /// Current machine state.
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Sticky sensor-fault flag.
    pub fn fault(&self) -> bool {
        self.fault
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Battery supervisor (read side).
    pub fn battery(&self) -> &BatteryMonitor {
        &self.battery
    }

    /// Minutes-at-home target for the next scheduled feed.
    pub fn next_feed_due_min(&self) -> u16 {
        self.next_feed_due_min
    }

    /// Whether the status indicator should be lit.
    pub fn indicator_active(&self) -> bool {
        self.fault || self.battery.is_low()
    }

    /// Record a battery sample (called at the supervisor cadence).
    pub fn update_battery(&mut self, raw: u8) {
        self.battery.update(raw);
    }

    /// Apply an operator configuration change. The caller persists it.
    pub fn set_field(&mut self, field: Field, value: u16) {
        self.config.set(field, value);
    }

    /// One control pass: dispatch trigger edges, then the timeout scan.
    ///
    /// `edges` are the debouncer's newly asserted bits for this tick;
    /// `home_seated` is the confirmed state of the home switch.
    pub fn poll<A: ActuatorOutput>(&mut self, edges: u8, home_seated: bool, actuator: &mut A) {
        if edges & TRIGGER_MASK != 0 {
            if edges & TRIGGER_HOME != 0 {
                // The transition to home masks concurrent triggers
                self.dispatch(Trigger::Home, home_seated, actuator);
            } else {
                if edges & TRIGGER_DOWN != 0 {
                    self.dispatch(Trigger::Down { forced: true }, home_seated, actuator);
                }
                if edges & TRIGGER_UP != 0 {
                    // Up cancels a concurrent down
                    self.dispatch(Trigger::Up, home_seated, actuator);
                }
            }
        }
        self.tick(home_seated, actuator);
    }

    /// Dispatch a single trigger event.
    ///
    /// Also the entry point for console force-up/force-down.
    pub fn dispatch<A: ActuatorOutput>(
        &mut self,
        trigger: Trigger,
        home_seated: bool,
        actuator: &mut A,
    ) {
        use MachineState::*;
        match trigger {
            Trigger::Home => match self.state {
                Stopped | MovingToHome => self.stop_at(AtHome, actuator),
                AtHome => self.retry_ticks = 0,
                MovingHomeToP1 => {
                    // The cord can brush the switch just after leaving
                    // home; past the grace window it means a tangle
                    if self.state_ticks > HOME_NOISE_GRACE_TICKS {
                        self.sensor_fault(actuator);
                    }
                }
                _ => self.sensor_fault(actuator), // spurious home sense
            },
            Trigger::Up => match self.state {
                Stopped | AtHome | AtP1 | AtP2 => self.seek_home(home_seated, actuator),
                StoppedHomeToP1 | StoppedP1ToP2 => {} // already stopped
                MovingHomeToP1 => self.stop_at(StoppedHomeToP1, actuator),
                MovingP1ToP2 => self.stop_at(StoppedP1ToP2, actuator),
                MovingToHome | MovingManual => self.stop_at(Stopped, actuator),
            },
            Trigger::Down { forced } => match self.state {
                Stopped | AtP2 => self.move_to(MovingManual, Direction::Lower, actuator),
                StoppedHomeToP1 => {
                    // Resume: elapsed_p1 carries on from the pause
                    self.move_to(MovingHomeToP1, Direction::Lower, actuator);
                }
                StoppedP1ToP2 => self.move_to(MovingP1ToP2, Direction::Lower, actuator),
                AtHome => {
                    if self.battery.allow_descent(forced) {
                        self.elapsed_p1 = 0;
                        self.move_to(MovingHomeToP1, Direction::Lower, actuator);
                    } else {
                        // Abort; re-entering draws a fresh feed slot
                        self.enter(AtHome);
                    }
                }
                AtP1 => {
                    self.elapsed_p2 = 0;
                    self.move_to(MovingP1ToP2, Direction::Lower, actuator);
                }
                MovingHomeToP1 => self.stop_at(StoppedHomeToP1, actuator),
                MovingP1ToP2 => self.stop_at(StoppedP1ToP2, actuator),
                MovingToHome | MovingManual => self.stop_at(Stopped, actuator),
            },
        }
    }

    /// The per-tick timeout scan, run after trigger dispatch.
    fn tick<A: ActuatorOutput>(&mut self, home_seated: bool, actuator: &mut A) {
        use MachineState::*;

        self.state_ticks = self.state_ticks.saturating_add(1);
        self.minute_acc += 1;
        if self.minute_acc >= TICKS_PER_MINUTE {
            self.minute_acc = 0;
            self.state_minutes = self.state_minutes.saturating_add(1);
        }

        match self.state {
            MovingHomeToP1 => {
                self.elapsed_p1 = self.elapsed_p1.saturating_add(1);
                if self.elapsed_p1 > self.config.p1_timeout {
                    self.stop_at(AtP1, actuator);
                }
            }
            MovingP1ToP2 => {
                self.elapsed_p2 = self.elapsed_p2.saturating_add(1);
                if self.elapsed_p2 > self.config.p2_timeout {
                    self.stop_at(AtP2, actuator);
                }
            }
            MovingManual => {
                if self.state_ticks > u32::from(self.config.manual_timeout) {
                    self.stop_at(Stopped, actuator);
                }
            }
            MovingToHome => {
                // A faulted retry gets the short window
                let limit = if self.fault {
                    self.config.manual_timeout
                } else {
                    self.config.home_timeout
                };
                if self.state_ticks > u32::from(limit) {
                    // Failed to reach home
                    self.sensor_fault(actuator);
                }
            }
            AtP1 => {
                if self.config.feed_duration > 0 && self.state_minutes >= self.config.feed_duration
                {
                    // Feed window over: auto-raise
                    self.seek_home(home_seated, actuator);
                }
            }
            AtHome => {
                if self.next_feed_due_min > 0 && self.state_minutes >= self.next_feed_due_min {
                    self.dispatch(Trigger::Down { forced: false }, home_seated, actuator);
                } else if self.config.home_retry > 0 {
                    self.retry_ticks += 1;
                    if self.retry_ticks > u32::from(self.config.home_retry) {
                        if home_seated {
                            self.retry_ticks = 0;
                        } else {
                            // Switch lost contact: nudge back onto it
                            self.seek_home(home_seated, actuator);
                        }
                    }
                }
            }
            state if state.is_idle_extended() => {
                if self.state_minutes >= SAFE_TIME_MINUTES {
                    // The gate must not hang extended indefinitely
                    self.seek_home(home_seated, actuator);
                }
            }
            _ => {}
        }
    }

    /// Enter a state, resetting the per-state counters. The leg
    /// counters `elapsed_p1`/`elapsed_p2` are deliberately untouched.
    fn enter(&mut self, next: MachineState) {
        self.state = next;
        self.state_ticks = 0;
        self.state_minutes = 0;
        self.retry_ticks = 0;
        if next == MachineState::AtHome {
            self.fault = false;
            self.next_feed_due_min =
                schedule::next_feed_minutes(self.config.feeds_per_week, self.prng.draw());
        }
    }

    fn stop_at<A: ActuatorOutput>(&mut self, next: MachineState, actuator: &mut A) {
        actuator.begin_stop();
        self.enter(next);
    }

    fn move_to<A: ActuatorOutput>(
        &mut self,
        next: MachineState,
        dir: Direction,
        actuator: &mut A,
    ) {
        actuator.begin_move(dir);
        self.enter(next);
    }

    /// Start raising toward home, unless the home switch already reads
    /// seated - winching in against a seated switch tangles the cord,
    /// so that inconsistency faults instead.
    fn seek_home<A: ActuatorOutput>(&mut self, home_seated: bool, actuator: &mut A) {
        if home_seated {
            self.sensor_fault(actuator);
        } else {
            self.move_to(MachineState::MovingToHome, Direction::Raise, actuator);
        }
    }

    fn sensor_fault<A: ActuatorOutput>(&mut self, actuator: &mut A) {
        self.fault = true;
        self.stop_at(MachineState::Stopped, actuator);
    }
}
