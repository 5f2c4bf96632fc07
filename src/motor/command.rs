// Command encoders for the SmartDrive
//
// Pure functions that turn a motion request into the exact bytes written
// to the board. No bus access happens here.

use super::registers::Register;
use super::{Channel, Direction, Motor, Result, SmartDriveError, StopAction};

/// Highest accepted speed value
pub const MAX_SPEED: u8 = 100;

/// Command byte that starts both motors at once after their blocks are loaded
pub const START_BOTH: u8 = 0x53;

/// Per-command control bitmask, written as the last byte of a command block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlByte(u8);

impl ControlByte {
    pub const SPEED: u8 = 0x01;
    pub const RAMP: u8 = 0x02;
    pub const RELATIVE: u8 = 0x04;
    pub const TACHO: u8 = 0x08;
    pub const BRAKE: u8 = 0x10;
    pub const HOLD_ON: u8 = 0x20;
    pub const TIME: u8 = 0x40;
    pub const GO: u8 = 0x80;

    pub fn raw(self) -> u8 {
        self.0
    }

    pub fn contains(self, flags: u8) -> bool {
        self.0 & flags == flags
    }

    pub fn with(self, flags: u8) -> Self {
        Self(self.0 | flags)
    }

    /// Control byte for a move of the given kind
    ///
    /// `mode` carries the mode flags (SPEED, TIME, TACHO, RELATIVE). GO is set
    /// unless both motors are selected; those start together via `START_BOTH`.
    pub fn for_move(mode: u8, stop: StopAction, motor: Motor) -> Self {
        let mut ctrl = Self(mode).with_stop(stop);
        if motor != Motor::Both {
            ctrl = ctrl.with(Self::GO);
        }
        ctrl
    }

    pub fn with_stop(self, stop: StopAction) -> Self {
        match stop {
            StopAction::Float => self,
            StopAction::Brake => self.with(Self::BRAKE),
            StopAction::BrakeHold => self.with(Self::BRAKE | Self::HOLD_ON),
        }
    }
}

pub fn check_speed(speed: u8) -> Result<()> {
    if speed > MAX_SPEED {
        return Err(SmartDriveError::InvalidSpeed {
            speed,
            max: MAX_SPEED,
        });
    }
    Ok(())
}

/// Speed byte as the board reads it: two's complement, negative for Reverse
pub fn signed_speed(direction: Direction, speed: u8) -> u8 {
    match direction {
        Direction::Forward => speed,
        Direction::Reverse => speed.wrapping_neg(),
    }
}

/// Relative displacement, negated for Reverse
pub fn signed_displacement(direction: Direction, degrees: i32) -> i32 {
    match direction {
        Direction::Forward => degrees,
        Direction::Reverse => degrees.wrapping_neg(),
    }
}

pub fn rotations_to_degrees(rotations: i32) -> Result<i32> {
    rotations
        .checked_mul(360)
        .ok_or(SmartDriveError::DisplacementOverflow { rotations })
}

/// 5-byte speed block: `[speed register, speed, seconds, 0, control]`
pub fn speed_block(channel: Channel, speed: u8, seconds: u8, ctrl: ControlByte) -> [u8; 5] {
    [Register::speed(channel).addr(), speed, seconds, 0, ctrl.raw()]
}

/// 9-byte setpoint block: `[setpoint register, target (LE), speed, 0, 0, control]`
pub fn setpoint_block(channel: Channel, target: [u8; 4], speed: u8, ctrl: ControlByte) -> [u8; 9] {
    [
        Register::setpoint(channel).addr(),
        target[0],
        target[1],
        target[2],
        target[3],
        speed,
        0,
        0,
        ctrl.raw(),
    ]
}

/// Stop command letter: uppercase brakes, lowercase floats, offset by motor index
pub fn stop_code(motor: Motor, action: StopAction) -> u8 {
    let base = match action {
        StopAction::Float => b'a',
        StopAction::Brake | StopAction::BrakeHold => b'A',
    };
    base + motor.index() - 1
}

/// Split a 16-bit gain into `[low, high]`
pub fn split_gain(gain: u16) -> [u8; 2] {
    [(gain % 0x100) as u8, (gain / 0x100) as u8]
}
