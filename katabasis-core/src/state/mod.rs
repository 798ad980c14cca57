//! Machine states and trigger events

pub mod events;
pub mod machine;

pub use events::Trigger;
pub use machine::MachineState;
