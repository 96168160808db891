//! Motor command handlers (forward, reverse, stop)

use crate::hardware::{Actuators, PinError};
use actuator_shared::{state_machine::MotorState, Led};
use tracing::info;

/// Apply a motor state, then flash both LEDs as feedback
pub async fn handle_drive(actuators: &mut Actuators, motor: MotorState) -> Result<(), PinError> {
    actuators.set_motor(motor)?;

    let state = actuators.state();
    match motor {
        MotorState::Running(direction) => info!(
            "Motor {:?}: IN1={} IN2={} ENA={}",
            direction,
            u8::from(state.in1),
            u8::from(state.in2),
            u8::from(state.enable)
        ),
        MotorState::Stopped => info!("Motor STOP"),
    }

    let hold = actuators.timing().feedback;
    actuators.pulse(&[Led::Led1, Led::Led2], hold).await
}
