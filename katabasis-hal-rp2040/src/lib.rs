//! RP2040 peripheral glue
//!
//! Adapts the chip's flash, GPIO, and watchdog to the traits the
//! control kernel consumes.

#![no_std]

pub mod flash;
pub mod inputs;
pub mod watchdog;
