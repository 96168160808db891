mod command;
mod config;
mod connection;
mod hardware;
mod input;
mod transport;

use anyhow::{Context, Result};
use command::CommandExecutor;
use config::NodeConfig;
use connection::ConnectionRegistry;
use hardware::{Actuators, SimulatedGpio};
use input::ButtonPoller;
use std::sync::Arc;
use transport::{wait_for_link_up, AddressWatch, LinkMonitor, LinkState, Listener};

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = NodeConfig::from_env()?;
    info!("Actuator node starting");
    info!("  Control port: {}", config.listener.addr);

    // Host build: pins are backed by an in-memory bank
    let gpio = Arc::new(SimulatedGpio::new());

    let mut actuators = Actuators::new(gpio.clone(), config.pins.clone(), config.timing.clone());
    actuators
        .configure()
        .context("Motor driver configuration failed")?;
    actuators.flash_ready().await.context("Ready flash failed")?;
    info!("System ready");

    let registry = Arc::new(ConnectionRegistry::new());

    let poller = ButtonPoller::new(
        gpio,
        config.pins.button,
        config.poller.clone(),
        registry.clone(),
    );
    poller.configure().context("Button configuration failed")?;
    let poller_handle = poller.start();
    info!("Button poller started");

    // The link is up while the listen address is assigned to this host
    let link_monitor = LinkMonitor::new(LinkState::Down);
    let mut link = link_monitor.subscribe();
    let watch_handle =
        AddressWatch::new(config.listener.addr.ip(), config.link_check, link_monitor).start();
    wait_for_link_up(&mut link).await?;

    let listener = Listener::bind(config.listener.clone())?;
    let mut executor = CommandExecutor::new(actuators);

    let result = listener.serve(&mut executor, registry, link).await;

    poller_handle.stop();
    watch_handle.stop();
    result
}
