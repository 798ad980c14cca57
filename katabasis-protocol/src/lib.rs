//! Wire protocols for the Katabasis feeder gate
//!
//! Two independent boundaries live here:
//!
//! - [`console`]: the line-oriented operator console - single-key
//!   commands with an optional decimal argument, PIN gating, and an
//!   idle lockout. The session layer turns bytes into typed events;
//!   text rendering stays with the firmware console task.
//! - [`drive`]: the boot-time configuration check against the paired
//!   motor-drive unit. Packets are HEADER, LENGTH, BODY and an additive
//!   8-bit checksum:
//!
//! ```text
//! ┌────────┬────────┬─────────────┬──────────┐
//! │ HEADER │ LENGTH │ BODY        │ CHECKSUM │
//! │ 1B     │ 1B     │ 0-16B       │ 1B       │
//! └────────┴────────┴─────────────┴──────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod console;
pub mod drive;

pub use console::{ConsoleEvent, Echo, Session, Step, HELP};
pub use drive::DriveError;
