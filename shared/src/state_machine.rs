//! Actuator and button state machines
//!
//! Pure state with no I/O: the node mirrors pin levels into [`ActuatorState`]
//! and feeds button samples through [`DebounceState`].

use crate::Led;

/// Motor rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// IN1 low, IN2 high
    Forward,
    /// IN1 high, IN2 low
    Reverse,
}

impl Direction {
    /// Direction pin levels as (IN1, IN2)
    pub fn pin_levels(self) -> (bool, bool) {
        match self {
            Direction::Forward => (false, true),
            Direction::Reverse => (true, false),
        }
    }
}

/// Requested motor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Stopped,
    Running(Direction),
}

/// Mirror of every actuator output level
///
/// Invariant: `enable` is true only while exactly one direction flag is set.
/// Stopping clears `enable` and both direction flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActuatorState {
    pub enable: bool,
    pub in1: bool,
    pub in2: bool,
    pub led1: bool,
    pub led2: bool,
}

impl ActuatorState {
    /// Everything off
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a motor state change
    pub fn apply_motor(&mut self, motor: MotorState) {
        match motor {
            MotorState::Stopped => {
                self.enable = false;
                self.in1 = false;
                self.in2 = false;
            }
            MotorState::Running(direction) => {
                let (in1, in2) = direction.pin_levels();
                self.in1 = in1;
                self.in2 = in2;
                self.enable = true;
            }
        }
    }

    /// Record an LED level
    pub fn set_led(&mut self, led: Led, on: bool) {
        match led {
            Led::Led1 => self.led1 = on,
            Led::Led2 => self.led2 = on,
        }
    }

    /// Current motor state derived from the pin levels
    pub fn motor(&self) -> MotorState {
        match (self.enable, self.in1, self.in2) {
            (true, false, true) => MotorState::Running(Direction::Forward),
            (true, true, false) => MotorState::Running(Direction::Reverse),
            _ => MotorState::Stopped,
        }
    }

    /// Check the enable/direction invariant
    pub fn is_consistent(&self) -> bool {
        if self.enable {
            self.in1 != self.in2
        } else {
            !self.in1 && !self.in2
        }
    }
}

/// Phase of the button poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPhase {
    /// Sampling, waiting for a falling edge
    Idle,
    /// Edge detected, event should be sent
    EdgeDetected,
    /// Settling after an edge before sampling resumes
    Debounce,
}

/// Falling-edge detector for an active-low button
///
/// Only a high to low transition reports an edge. Holding the pin low or
/// bouncing while low does not re-trigger until the pin reads high again.
#[derive(Debug, Clone)]
pub struct DebounceState {
    last_high: bool,
    phase: ButtonPhase,
}

impl Default for DebounceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DebounceState {
    /// A released button (pulled up) is the starting level
    pub fn new() -> Self {
        Self {
            last_high: true,
            phase: ButtonPhase::Idle,
        }
    }

    pub fn phase(&self) -> ButtonPhase {
        self.phase
    }

    /// Feed one sample; returns true on a falling edge
    pub fn sample(&mut self, high: bool) -> bool {
        let edge = self.last_high && !high;
        self.last_high = high;
        if edge {
            self.phase = ButtonPhase::EdgeDetected;
        }
        edge
    }

    /// The edge has been handled; settle before sampling again
    pub fn begin_debounce(&mut self) {
        self.phase = ButtonPhase::Debounce;
    }

    /// Settle window elapsed
    pub fn settle(&mut self) {
        self.phase = ButtonPhase::Idle;
    }
}
