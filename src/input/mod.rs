//! Input Module
//!
//! Polls the push button and reports presses to the connected client.

mod poller;

pub use poller::{ButtonPoller, PollerConfig};
