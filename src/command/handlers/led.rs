//! Blink command handler

use crate::hardware::{Actuators, PinError};
use actuator_shared::Led;
use tracing::info;

/// Hold one LED on for the blink duration, then off
///
/// Stalls the caller for the whole hold.
pub async fn handle_blink(actuators: &mut Actuators, led: Led) -> Result<(), PinError> {
    info!("Blinking {}", led);
    let hold = actuators.timing().led_blink;
    actuators.pulse(&[led], hold).await
}
