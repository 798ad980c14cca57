//! Hardware driver implementations for the Katabasis feeder gate
//!
//! Drivers hold sequencing logic only; pin and control-voltage I/O go
//! through small traits the firmware adapts to the real peripherals.

#![no_std]
#![deny(unsafe_code)]

pub mod sense;
pub mod winch;
