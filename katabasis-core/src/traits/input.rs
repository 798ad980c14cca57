//! Trigger input port trait

/// Raw trigger switch sampling.
///
/// Returns the trigger bits defined in [`crate::input`], active-high:
/// a set bit means the switch is currently closed. The physical lines
/// are pulled up and close to ground, so implementations invert the
/// port before returning it.
pub trait TriggerPort {
    /// Sample the raw (undebounced) trigger bits.
    fn read(&mut self) -> u8;
}
