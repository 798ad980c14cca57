//! Peripheral adapters for the driver traits

use embassy_rp::gpio::Output;
use embassy_rp::pwm::PwmOutput;
use embedded_hal::pwm::SetDutyCycle;

use katabasis_drivers::winch::{ControlVoltage, RelayPin};

/// Relay coil output (active-high driver transistor).
pub struct Relay {
    pin: Output<'static>,
}

impl Relay {
    pub fn new(pin: Output<'static>) -> Self {
        Self { pin }
    }
}

impl RelayPin for Relay {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }
}

/// Control voltage output: PWM into the board's RC filter.
pub struct ControlVoltageOut {
    out: PwmOutput<'static>,
}

impl ControlVoltageOut {
    pub fn new(out: PwmOutput<'static>) -> Self {
        Self { out }
    }
}

impl ControlVoltage for ControlVoltageOut {
    fn set_level(&mut self, level: u8) {
        // 8-bit level across the full duty range; the fraction setter
        // cannot fail for a denominator this size
        let _ = self.out.set_duty_cycle_fraction(u16::from(level), 255);
    }
}
