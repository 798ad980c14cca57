//! Board-agnostic control kernel for the Katabasis feeder gate
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (actuator, trigger port, nonvolatile store)
//! - Trigger input debouncing
//! - The motion state machine and its per-state timers
//! - Battery/safety supervision
//! - Persistent parameter store with entropy-ring seed rotation
//! - The randomized feed scheduler

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod input;
pub mod prng;
pub mod safety;
pub mod schedule;
pub mod state;
pub mod traits;
