//! Client connection handling
//!
//! This module handles:
//! - The lifecycle of a single accepted client (non-blocking receive loop,
//!   command dispatch, replies, teardown)
//! - The registry through which the button poller reaches that client

mod registry;
mod session;

pub use registry::ConnectionRegistry;
pub use session::{Session, SessionConfig, SessionEnd};
