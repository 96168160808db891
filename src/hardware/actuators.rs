//! Actuator interface: motor driver and status LEDs

use super::gpio::{GpioPort, PinError, PinId};
use actuator_shared::{
    protocol,
    state_machine::{ActuatorState, MotorState},
    Led,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Board wiring
#[derive(Debug, Clone)]
pub struct PinMap {
    /// Motor driver ENA
    pub motor_enable: PinId,
    /// Motor driver IN1
    pub motor_in1: PinId,
    /// Motor driver IN2
    pub motor_in2: PinId,
    pub led1: PinId,
    pub led2: PinId,
    /// Active-low push button
    pub button: PinId,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            motor_enable: 8,
            motor_in1: 4,
            motor_in2: 5,
            led1: 12,
            led2: 13,
            button: 9,
        }
    }
}

impl PinMap {
    pub fn led(&self, led: Led) -> PinId {
        match led {
            Led::Led1 => self.led1,
            Led::Led2 => self.led2,
        }
    }

    fn outputs(&self) -> [PinId; 5] {
        [
            self.motor_enable,
            self.motor_in1,
            self.motor_in2,
            self.led1,
            self.led2,
        ]
    }
}

#[derive(Debug, Clone, Copy)]
enum MotorPin {
    Enable,
    In1,
    In2,
}

impl MotorPin {
    fn level(self, state: &ActuatorState) -> bool {
        match self {
            MotorPin::Enable => state.enable,
            MotorPin::In1 => state.in1,
            MotorPin::In2 => state.in2,
        }
    }
}

/// Durations of the visual feedback pulses
#[derive(Debug, Clone)]
pub struct PulseTiming {
    /// Single LED hold for the blink command
    pub led_blink: Duration,
    /// Both LEDs after a motor command
    pub feedback: Duration,
    /// Both LEDs once at startup
    pub ready_flash: Duration,
}

impl Default for PulseTiming {
    fn default() -> Self {
        Self {
            led_blink: Duration::from_millis(protocol::LED_BLINK_MS),
            feedback: Duration::from_millis(protocol::FEEDBACK_PULSE_MS),
            ready_flash: Duration::from_millis(protocol::READY_FLASH_MS),
        }
    }
}

/// Drives the motor and LEDs and mirrors their levels
///
/// Pulses sleep for their full duration. Callers stall for that long, which
/// is only acceptable because a single session owns the actuators.
pub struct Actuators {
    gpio: Arc<dyn GpioPort>,
    pins: PinMap,
    timing: PulseTiming,
    state: ActuatorState,
}

impl Actuators {
    pub fn new(gpio: Arc<dyn GpioPort>, pins: PinMap, timing: PulseTiming) -> Self {
        Self {
            gpio,
            pins,
            timing,
            state: ActuatorState::new(),
        }
    }

    /// Configure every output and drive it low
    pub fn configure(&mut self) -> Result<(), PinError> {
        for pin in self.pins.outputs() {
            self.gpio.configure_output(pin)?;
            self.gpio.set_level(pin, false)?;
        }
        self.state = ActuatorState::new();
        info!(
            "Motor driver configured: ENA={} IN1={} IN2={} LED1={} LED2={}",
            self.pins.motor_enable,
            self.pins.motor_in1,
            self.pins.motor_in2,
            self.pins.led1,
            self.pins.led2
        );
        Ok(())
    }

    /// Last levels written
    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn timing(&self) -> &PulseTiming {
        &self.timing
    }

    /// Set the motor driver pins
    ///
    /// Running sets direction before enable; stopping drops enable first.
    /// The mirror follows each write as it lands. If a write fails, enable is
    /// dropped and the mirror keeps whatever levels were actually driven.
    pub fn set_motor(&mut self, motor: MotorState) -> Result<(), PinError> {
        let mut target = self.state;
        target.apply_motor(motor);

        let order = match motor {
            MotorState::Running(_) => [MotorPin::In1, MotorPin::In2, MotorPin::Enable],
            MotorState::Stopped => [MotorPin::Enable, MotorPin::In1, MotorPin::In2],
        };

        for pin in order {
            if let Err(e) = self.write_motor_pin(pin, pin.level(&target)) {
                self.disable_motor();
                return Err(e);
            }
        }
        Ok(())
    }

    fn write_motor_pin(&mut self, pin: MotorPin, high: bool) -> Result<(), PinError> {
        let id = match pin {
            MotorPin::Enable => self.pins.motor_enable,
            MotorPin::In1 => self.pins.motor_in1,
            MotorPin::In2 => self.pins.motor_in2,
        };
        self.gpio.set_level(id, high)?;

        match pin {
            MotorPin::Enable => self.state.enable = high,
            MotorPin::In1 => self.state.in1 = high,
            MotorPin::In2 => self.state.in2 = high,
        }
        Ok(())
    }

    fn disable_motor(&mut self) {
        if !self.state.enable {
            return;
        }
        if let Err(e) = self.write_motor_pin(MotorPin::Enable, false) {
            warn!("Unable to disable motor after failed write: {}", e);
        }
    }

    /// Turn LEDs on, hold, then turn them off
    pub async fn pulse(&mut self, leds: &[Led], hold: Duration) -> Result<(), PinError> {
        for &led in leds {
            self.set_led(led, true)?;
        }
        tokio::time::sleep(hold).await;
        for &led in leds {
            self.set_led(led, false)?;
        }
        Ok(())
    }

    /// Flash both LEDs once to signal the system is ready
    pub async fn flash_ready(&mut self) -> Result<(), PinError> {
        let hold = self.timing.ready_flash;
        self.pulse(&[Led::Led1, Led::Led2], hold).await
    }

    fn set_led(&mut self, led: Led, on: bool) -> Result<(), PinError> {
        self.gpio.set_level(self.pins.led(led), on)?;
        self.state.set_led(led, on);
        Ok(())
    }
}
