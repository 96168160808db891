//! Actuator Node Shared Protocol Types
//!
//! This crate provides the command set, reply lines and line codec shared
//! between the actuator node and the operator console.

pub mod codec;
pub mod state_machine;

use bytes::Bytes;

/// Fixed protocol and timing parameters
pub mod protocol {
    /// TCP control port
    pub const CONTROL_PORT: u16 = 3333;

    /// Pending connections allowed while a session is active
    pub const LISTEN_BACKLOG: u32 = 1;

    /// Seconds of idle time before the first keep-alive probe
    pub const KEEPALIVE_IDLE_SECS: u64 = 5;

    /// Seconds between keep-alive probes
    pub const KEEPALIVE_INTERVAL_SECS: u64 = 5;

    /// Unanswered probes before the peer is considered dead
    pub const KEEPALIVE_PROBES: u32 = 3;

    /// Session receive tick in milliseconds
    pub const SESSION_TICK_MS: u64 = 10;

    /// Receive buffer size; one byte is kept spare
    pub const RX_BUFFER_LEN: usize = 128;

    /// Button sample tick in milliseconds
    pub const BUTTON_POLL_MS: u64 = 50;

    /// Settle delay after a button edge in milliseconds
    pub const BUTTON_DEBOUNCE_MS: u64 = 200;

    /// How long the `L` command holds an LED on
    pub const LED_BLINK_MS: u64 = 1000;

    /// Feedback flash of both LEDs after a motor command
    pub const FEEDBACK_PULSE_MS: u64 = 100;

    /// Startup flash of both LEDs
    pub const READY_FLASH_MS: u64 = 500;

    /// How often the node re-checks its network address
    pub const LINK_CHECK_MS: u64 = 1000;
}

/// One of the two status LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Led {
    Led1,
    Led2,
}

impl Led {
    /// The LED pulsed after this one
    pub fn next(self) -> Self {
        match self {
            Led::Led1 => Led::Led2,
            Led::Led2 => Led::Led1,
        }
    }
}

impl std::fmt::Display for Led {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Led::Led1 => write!(f, "LED1"),
            Led::Led2 => write!(f, "LED2"),
        }
    }
}

/// Commands recognised on the control channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `L`: blink the next LED
    Blink,
    /// `F`: run the motor forward
    Forward,
    /// `R`: run the motor in reverse
    Reverse,
    /// `S`: stop the motor
    Stop,
}

impl Command {
    /// Parse the first byte of a receive, case-insensitively
    ///
    /// Every other byte is ignored. Unknown or empty input is `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        match data.first()?.to_ascii_uppercase() {
            b'L' => Some(Command::Blink),
            b'F' => Some(Command::Forward),
            b'R' => Some(Command::Reverse),
            b'S' => Some(Command::Stop),
            _ => None,
        }
    }
}

/// Lines the node sends to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    LedBlinked(Led),
    MotorForward,
    MotorReverse,
    MotorStopped,
    /// Unsolicited, pushed by the button poller
    ButtonPressed,
}

impl Reply {
    /// Line text without terminator
    pub fn text(&self) -> &'static str {
        match self {
            Reply::LedBlinked(Led::Led1) => "LED1 Blinked",
            Reply::LedBlinked(Led::Led2) => "LED2 Blinked",
            Reply::MotorForward => "Motor Forward (F)",
            Reply::MotorReverse => "Motor Reverse (R)",
            Reply::MotorStopped => "Motor Stopped",
            Reply::ButtonPressed => "Button Pressed!",
        }
    }

    /// Encoded line ready for the wire
    pub fn to_line(&self) -> Bytes {
        codec::encode_line(self.text())
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}
