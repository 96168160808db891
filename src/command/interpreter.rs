//! Command interpreter - maps received bytes to actuator actions

use actuator_shared::{
    state_machine::{Direction, MotorState},
    Command, Led, Reply,
};

/// What the actuators should do for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorAction {
    /// Hold one LED on for the blink duration
    Blink(Led),
    /// Change the motor state, then flash both LEDs briefly
    Drive(MotorState),
}

/// An interpreted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interpretation {
    pub action: ActuatorAction,
    pub reply: Reply,
}

/// Maps the first byte of a receive to an action and a reply
///
/// The only state is which LED the next blink uses. It flips on blink
/// commands and nothing else.
#[derive(Debug)]
pub struct CommandInterpreter {
    next_led: Led,
}

impl Default for CommandInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandInterpreter {
    pub fn new() -> Self {
        Self { next_led: Led::Led1 }
    }

    /// LED the next blink command will pulse
    #[cfg(test)]
    pub fn next_led(&self) -> Led {
        self.next_led
    }

    /// Interpret received data; `None` for anything unrecognised
    pub fn interpret(&mut self, data: &[u8]) -> Option<Interpretation> {
        let interpretation = match Command::parse(data)? {
            Command::Blink => {
                let led = self.next_led;
                self.next_led = led.next();
                Interpretation {
                    action: ActuatorAction::Blink(led),
                    reply: Reply::LedBlinked(led),
                }
            }
            Command::Forward => Interpretation {
                action: ActuatorAction::Drive(MotorState::Running(Direction::Forward)),
                reply: Reply::MotorForward,
            },
            Command::Reverse => Interpretation {
                action: ActuatorAction::Drive(MotorState::Running(Direction::Reverse)),
                reply: Reply::MotorReverse,
            },
            Command::Stop => Interpretation {
                action: ActuatorAction::Drive(MotorState::Stopped),
                reply: Reply::MotorStopped,
            },
        };
        Some(interpretation)
    }
}
