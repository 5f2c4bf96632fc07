// Motor control module for the SmartDrive dual DC motor board
//
// Provides:
// - The board's register map
// - A register-level I2C transport adapter
// - Pure command encoders (control byte, command blocks, stop codes)
// - The high-level SmartDrive client with completion polling

pub mod bus;
pub mod command;
mod driver;
pub mod registers;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt;

pub use bus::RegisterBus;
pub use command::{ControlByte, MAX_SPEED, START_BOTH};
pub use driver::{battery_voltage_from_raw, Completion, SmartDrive};
pub use registers::{Access, Register};

/// Motor selector for commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    One = 1,
    Two = 2,
    Both = 3,
}

/// A single motor output on the board
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    One = 1,
    Two = 2,
}

impl Motor {
    /// Channels addressed by this selector, Motor 1 first
    pub fn channels(self) -> &'static [Channel] {
        match self {
            Motor::One => &[Channel::One],
            Motor::Two => &[Channel::Two],
            Motor::Both => &[Channel::One, Channel::Two],
        }
    }

    /// The single channel, or `None` for `Both`
    pub fn single(self) -> Option<Channel> {
        match self {
            Motor::One => Some(Channel::One),
            Motor::Two => Some(Channel::Two),
            Motor::Both => None,
        }
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

impl From<Channel> for Motor {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::One => Motor::One,
            Channel::Two => Motor::Two,
        }
    }
}

impl fmt::Display for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Motor::One => write!(f, "motor 1"),
            Motor::Two => write!(f, "motor 2"),
            Motor::Both => write!(f, "both motors"),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Motor::from(*self).fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// What the motor does once a command ends (or on an explicit stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAction {
    /// Cut power and coast
    Float,
    /// Brake and resist changes to the tacho count
    Brake,
    /// Brake and restore externally forced changes to the tacho count
    BrakeHold,
}

/// Error types for SmartDrive communication
#[derive(Debug, thiserror::Error)]
pub enum SmartDriveError {
    #[error("Cannot open I2C bus {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Invalid 7-bit device address 0x{address:02X}")]
    InvalidAddress { address: u8 },

    #[error("I2C transfer with device 0x{address:02X} at register 0x{register:02X} failed: {kind}")]
    Bus {
        address: u8,
        register: u8,
        kind: embedded_hal::i2c::ErrorKind,
    },

    #[error("{motor} is not valid here, select motor 1 or motor 2")]
    SingleMotorRequired { motor: Motor },

    #[error("Speed {speed} out of range (max {max})")]
    InvalidSpeed { speed: u8, max: u8 },

    #[error("Displacement of {rotations} rotations does not fit in 32 bits")]
    DisplacementOverflow { rotations: i32 },

    #[error("Timed out after {waited:?} waiting for {motor} to finish")]
    Timeout {
        motor: Motor,
        waited: std::time::Duration,
    },
}

pub type Result<T> = std::result::Result<T, SmartDriveError>;
