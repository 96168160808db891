//! Button Poller
//!
//! Samples the button on its own schedule, independent of the session, and
//! pushes a line to the connected client on each press.

use crate::connection::ConnectionRegistry;
use crate::hardware::{GpioPort, PinError, PinId, Pull};
use actuator_shared::{protocol, state_machine::DebounceState, Reply};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, trace, warn};

/// Sampling and debounce timing
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Sample cadence
    pub tick: Duration,
    /// Settle delay after an edge
    pub debounce: Duration,
    /// Input bias for the button pin
    pub pull: Pull,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(protocol::BUTTON_POLL_MS),
            debounce: Duration::from_millis(protocol::BUTTON_DEBOUNCE_MS),
            pull: Pull::Up,
        }
    }
}

/// Watches an active-low button and reports presses through the registry
pub struct ButtonPoller {
    gpio: Arc<dyn GpioPort>,
    pin: PinId,
    config: PollerConfig,
    registry: Arc<ConnectionRegistry>,
    debounce: DebounceState,
}

impl ButtonPoller {
    pub fn new(
        gpio: Arc<dyn GpioPort>,
        pin: PinId,
        config: PollerConfig,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            gpio,
            pin,
            config,
            registry,
            debounce: DebounceState::new(),
        }
    }

    /// Configure the button pin as an input
    pub fn configure(&self) -> Result<(), PinError> {
        self.gpio.configure_input(self.pin, self.config.pull)
    }

    /// Start polling in a background task
    pub fn start(self) -> PollerHandle {
        let task = tokio::spawn(self.run());
        PollerHandle { task }
    }

    /// Poll forever
    pub async fn run(mut self) {
        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("[BTN] Polling GPIO {} every {:?}", self.pin, self.config.tick);

        loop {
            ticker.tick().await;

            let high = match self.gpio.read_level(self.pin) {
                Ok(level) => level,
                Err(e) => {
                    warn!("[BTN] Read failed: {}", e);
                    continue;
                }
            };

            if !high {
                trace!("[BTN] GPIO {} is LOW", self.pin);
            }

            if self.debounce.sample(high) {
                self.report_press().await;
                self.debounce.begin_debounce();
                tokio::time::sleep(self.config.debounce).await;
                self.debounce.settle();
            }
        }
    }

    async fn report_press(&self) {
        if self.registry.try_send(Reply::ButtonPressed.to_line()).await {
            info!("[BTN] Sent button press to client");
        } else {
            info!("[BTN] Button pressed but no client connected");
        }
    }
}

/// Handle to the polling task
pub struct PollerHandle {
    task: tokio::task::JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling
    pub fn stop(self) {
        self.task.abort();
    }
}
