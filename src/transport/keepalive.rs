//! TCP keep-alive tuning for accepted sockets
//!
//! A silent peer is only ever reaped by keep-alive failure surfacing as a
//! receive error, so every accepted socket gets these probes.

use actuator_shared::protocol;
use anyhow::Result;
use socket2::{SockRef, TcpKeepalive};
use std::time::Duration;
use tokio::net::TcpStream;

/// Keep-alive probe timing
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Idle time before the first probe
    pub idle: Duration,
    /// Time between probes
    pub interval: Duration,
    /// Unanswered probes before the connection is dropped
    pub retries: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(protocol::KEEPALIVE_IDLE_SECS),
            interval: Duration::from_secs(protocol::KEEPALIVE_INTERVAL_SECS),
            retries: protocol::KEEPALIVE_PROBES,
        }
    }
}

/// Enable keep-alive with the configured probe timing
pub fn apply_keepalive(stream: &TcpStream, config: &KeepaliveConfig) -> Result<()> {
    let keepalive = TcpKeepalive::new()
        .with_time(config.idle)
        .with_interval(config.interval)
        .with_retries(config.retries);

    SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    Ok(())
}
