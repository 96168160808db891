//! Action handlers applying interpreted commands to the actuators

mod led;
mod motor;

pub use led::handle_blink;
pub use motor::handle_drive;
