//! Command executor - interprets received data and drives the actuators

use super::handlers;
use super::interpreter::{ActuatorAction, CommandInterpreter};
use crate::hardware::Actuators;
use actuator_shared::Reply;
use tracing::{debug, error};

/// Result of executing received data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Actuators updated; the reply should be sent
    Completed(Reply),
    /// Unrecognised input; nothing happened and nothing is sent
    Ignored,
    /// A pin write failed part way; nothing is sent
    Failed { message: String },
}

/// Applies interpreted commands to the actuators
///
/// Lives across sessions so the LED alternation carries over reconnects.
pub struct CommandExecutor {
    interpreter: CommandInterpreter,
    actuators: Actuators,
}

impl CommandExecutor {
    pub fn new(actuators: Actuators) -> Self {
        Self {
            interpreter: CommandInterpreter::new(),
            actuators,
        }
    }

    #[cfg(test)]
    pub fn actuators(&self) -> &Actuators {
        &self.actuators
    }

    /// Execute one receive
    ///
    /// Blocks the caller for the pulse duration of the command.
    pub async fn execute(&mut self, data: &[u8]) -> CommandResult {
        let Some(interpretation) = self.interpreter.interpret(data) else {
            debug!("Ignoring unrecognised input ({} bytes)", data.len());
            return CommandResult::Ignored;
        };

        let result = match interpretation.action {
            ActuatorAction::Blink(led) => handlers::handle_blink(&mut self.actuators, led).await,
            ActuatorAction::Drive(motor) => {
                handlers::handle_drive(&mut self.actuators, motor).await
            }
        };

        match result {
            Ok(()) => CommandResult::Completed(interpretation.reply),
            Err(e) => {
                error!("Command {:?} failed: {}", interpretation.action, e);
                CommandResult::Failed {
                    message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{GpioPort, PinMap, PulseTiming, SimulatedGpio};
    use actuator_shared::state_machine::{Direction, MotorState};
    use actuator_shared::Led;
    use std::sync::Arc;

    fn executor() -> (Arc<SimulatedGpio>, CommandExecutor) {
        let gpio = Arc::new(SimulatedGpio::new());
        let mut actuators = Actuators::new(gpio.clone(), PinMap::default(), PulseTiming::default());
        actuators.configure().expect("configure failed");
        (gpio, CommandExecutor::new(actuators))
    }

    #[tokio::test(start_paused = true)]
    async fn test_motor_commands_set_state() {
        let (_gpio, mut executor) = executor();

        assert_eq!(
            executor.execute(b"F").await,
            CommandResult::Completed(Reply::MotorForward)
        );
        let state = executor.actuators().state();
        assert!(state.enable);
        assert_eq!((state.in1, state.in2), (false, true));
        assert_eq!(state.motor(), MotorState::Running(Direction::Forward));

        assert_eq!(
            executor.execute(b"r").await,
            CommandResult::Completed(Reply::MotorReverse)
        );
        let state = executor.actuators().state();
        assert!(state.enable);
        assert_eq!((state.in1, state.in2), (true, false));

        assert_eq!(
            executor.execute(b"s").await,
            CommandResult::Completed(Reply::MotorStopped)
        );
        let state = executor.actuators().state();
        assert!(!state.enable && !state.in1 && !state.in2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_motor_command_flashes_both_leds() {
        let (gpio, mut executor) = executor();
        let pins = PinMap::default();

        let start = tokio::time::Instant::now();
        executor.execute(b"F").await;

        assert!(start.elapsed() >= PulseTiming::default().feedback);
        assert_eq!(gpio.rising_edges(pins.led1), 1);
        assert_eq!(gpio.rising_edges(pins.led2), 1);
        assert_eq!(gpio.level(pins.led1), Some(false));
        assert_eq!(gpio.level(pins.led2), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blink_alternates_leds() {
        let (gpio, mut executor) = executor();
        let pins = PinMap::default();

        assert_eq!(
            executor.execute(b"L").await,
            CommandResult::Completed(Reply::LedBlinked(Led::Led1))
        );
        assert_eq!(gpio.rising_edges(pins.led1), 1);
        assert_eq!(gpio.rising_edges(pins.led2), 0);

        assert_eq!(
            executor.execute(b"l").await,
            CommandResult::Completed(Reply::LedBlinked(Led::Led2))
        );
        assert_eq!(gpio.rising_edges(pins.led2), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_input_touches_nothing() {
        let (gpio, mut executor) = executor();
        let writes = gpio.writes().len();
        let before = executor.actuators().state();

        assert_eq!(executor.execute(b"Q").await, CommandResult::Ignored);
        assert_eq!(executor.execute(b"").await, CommandResult::Ignored);

        assert_eq!(gpio.writes().len(), writes);
        assert_eq!(executor.actuators().state(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pin_failure_is_reported() {
        let (gpio, mut executor) = executor();
        // Reconfiguring the enable pin as an input makes motor writes fail
        gpio.configure_input(PinMap::default().motor_enable, crate::hardware::Pull::Down)
            .unwrap();

        let result = executor.execute(b"F").await;
        assert!(matches!(result, CommandResult::Failed { .. }));
    }
}
