//! Firmware tasks

pub mod console;
pub mod control;
pub mod tick;

pub use console::console_task;
pub use control::control_task;
pub use tick::tick_task;
