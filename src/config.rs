//! Node configuration

use crate::hardware::{PinMap, Pull, PulseTiming};
use crate::input::PollerConfig;
use crate::transport::ListenerConfig;
use actuator_shared::protocol;
use anyhow::{anyhow, Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

/// Environment variable overriding the listen address
pub const LISTEN_ADDR_ENV: &str = "ACTUATOR_LISTEN_ADDR";

/// Environment variable overriding the button bias (`up`, `down`, `none`)
pub const BUTTON_PULL_ENV: &str = "ACTUATOR_BUTTON_PULL";

/// Everything the node needs at startup
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub listener: ListenerConfig,
    pub pins: PinMap,
    pub timing: PulseTiming,
    pub poller: PollerConfig,
    /// Period of the network address check
    pub link_check: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            pins: PinMap::default(),
            timing: PulseTiming::default(),
            poller: PollerConfig::default(),
            link_check: Duration::from_millis(protocol::LINK_CHECK_MS),
        }
    }
}

impl NodeConfig {
    /// Defaults with overrides from the process environment
    pub fn from_env() -> Result<Self> {
        Self::with_overrides(
            std::env::var(LISTEN_ADDR_ENV).ok().as_deref(),
            std::env::var(BUTTON_PULL_ENV).ok().as_deref(),
        )
    }

    fn with_overrides(addr: Option<&str>, pull: Option<&str>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = addr {
            config.listener.addr = raw
                .parse::<SocketAddr>()
                .with_context(|| format!("Invalid {}: {:?}", LISTEN_ADDR_ENV, raw))?;
        }
        if let Some(raw) = pull {
            config.poller.pull = raw
                .parse::<Pull>()
                .map_err(|e| anyhow!("Invalid {}: {}", BUTTON_PULL_ENV, e))?;
        }
        Ok(config)
    }
}
