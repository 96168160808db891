//! Transport Module
//!
//! Control listener, socket keep-alive and network link state.

mod keepalive;
mod link;
mod listener;

pub use link::{wait_for_link_down, wait_for_link_up, AddressWatch, LinkMonitor, LinkState};
pub use listener::{Listener, ListenerConfig};
