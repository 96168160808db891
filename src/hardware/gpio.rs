//! GPIO port abstraction
//!
//! The node only needs four pin operations. Boards implement [`GpioPort`];
//! hosts without pins and the tests use [`SimulatedGpio`].

use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Pin number on the board
pub type PinId = u8;

/// Input bias
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
    Floating,
}

impl FromStr for Pull {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Pull::Up),
            "down" => Ok(Pull::Down),
            "none" | "floating" => Ok(Pull::Floating),
            other => Err(format!("unknown pull {:?} (expected up, down or none)", other)),
        }
    }
}

/// How a pin has been configured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Output,
    Input(Pull),
}

/// Errors from pin operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    #[error("GPIO {0} has not been configured")]
    NotConfigured(PinId),

    #[error("GPIO {pin} is configured as {actual:?}, not {expected}")]
    WrongMode {
        pin: PinId,
        expected: &'static str,
        actual: PinMode,
    },
}

/// Digital pin access shared by the session and the button poller
pub trait GpioPort: Send + Sync + 'static {
    /// Configure a pin as a push-pull output
    fn configure_output(&self, pin: PinId) -> Result<(), PinError>;

    /// Drive an output pin
    fn set_level(&self, pin: PinId, high: bool) -> Result<(), PinError>;

    /// Configure a pin as an input with the given bias
    fn configure_input(&self, pin: PinId, pull: Pull) -> Result<(), PinError>;

    /// Sample an input pin; true is high
    fn read_level(&self, pin: PinId) -> Result<bool, PinError>;
}

#[derive(Debug, Clone, Copy)]
struct PinSlot {
    mode: PinMode,
    high: bool,
}

#[derive(Debug, Default)]
struct Bank {
    pins: HashMap<PinId, PinSlot>,
    /// Every output write, in order
    #[cfg(test)]
    writes: Vec<(PinId, bool)>,
}

/// In-memory pin bank
///
/// Outputs remember their level; inputs read their pull level until a test
/// drives them.
#[derive(Debug, Default)]
pub struct SimulatedGpio {
    bank: Mutex<Bank>,
}

impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl SimulatedGpio {
    /// Force the level seen on an input pin
    pub fn drive_input(&self, pin: PinId, high: bool) {
        let mut bank = self.bank.lock();
        let slot = bank.pins.entry(pin).or_insert(PinSlot {
            mode: PinMode::Input(Pull::Floating),
            high,
        });
        slot.high = high;
    }

    /// Current level of a pin, if configured
    pub fn level(&self, pin: PinId) -> Option<bool> {
        self.bank.lock().pins.get(&pin).map(|slot| slot.high)
    }

    /// Current mode of a pin, if configured
    pub fn mode(&self, pin: PinId) -> Option<PinMode> {
        self.bank.lock().pins.get(&pin).map(|slot| slot.mode)
    }

    /// Number of low to high writes seen on an output pin
    pub fn rising_edges(&self, pin: PinId) -> usize {
        let bank = self.bank.lock();
        let mut last = false;
        let mut edges = 0;
        for &(p, high) in &bank.writes {
            if p != pin {
                continue;
            }
            if high && !last {
                edges += 1;
            }
            last = high;
        }
        edges
    }

    /// Output writes in order
    pub fn writes(&self) -> Vec<(PinId, bool)> {
        self.bank.lock().writes.clone()
    }
}

impl GpioPort for SimulatedGpio {
    fn configure_output(&self, pin: PinId) -> Result<(), PinError> {
        let mut bank = self.bank.lock();
        bank.pins.insert(
            pin,
            PinSlot {
                mode: PinMode::Output,
                high: false,
            },
        );
        debug!("[GPIO] {} configured as output", pin);
        Ok(())
    }

    fn set_level(&self, pin: PinId, high: bool) -> Result<(), PinError> {
        let mut bank = self.bank.lock();
        let slot = bank.pins.get_mut(&pin).ok_or(PinError::NotConfigured(pin))?;
        if slot.mode != PinMode::Output {
            return Err(PinError::WrongMode {
                pin,
                expected: "output",
                actual: slot.mode,
            });
        }
        slot.high = high;
        #[cfg(test)]
        bank.writes.push((pin, high));
        debug!("[GPIO] {} -> {}", pin, u8::from(high));
        Ok(())
    }

    fn configure_input(&self, pin: PinId, pull: Pull) -> Result<(), PinError> {
        let mut bank = self.bank.lock();
        bank.pins.insert(
            pin,
            PinSlot {
                mode: PinMode::Input(pull),
                high: pull == Pull::Up,
            },
        );
        debug!("[GPIO] {} configured as input ({:?})", pin, pull);
        Ok(())
    }

    fn read_level(&self, pin: PinId) -> Result<bool, PinError> {
        let bank = self.bank.lock();
        let slot = bank.pins.get(&pin).ok_or(PinError::NotConfigured(pin))?;
        match slot.mode {
            PinMode::Input(_) => Ok(slot.high),
            actual => Err(PinError::WrongMode {
                pin,
                expected: "input",
                actual,
            }),
        }
    }
}
