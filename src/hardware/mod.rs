//! Hardware Module
//!
//! Pin access and the actuator interface (motor driver + two status LEDs).

mod actuators;
mod gpio;

pub use actuators::{Actuators, PinMap, PulseTiming};
pub use gpio::{GpioPort, PinError, PinId, Pull, SimulatedGpio};
