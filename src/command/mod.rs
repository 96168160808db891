//! Command handling for the control channel
//!
//! This module handles:
//! - Interpreting the first byte of each receive
//! - Applying motor and LED actions through the actuator interface
//! - Producing the reply line for recognised commands

mod executor;
pub mod handlers;
mod interpreter;

pub use executor::{CommandExecutor, CommandResult};
