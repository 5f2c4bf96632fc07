// Report values handed back to callers
//
// Plain data with serde derives so the CLI (or anything else) decides how to render them.

use serde::{Deserialize, Serialize};

use crate::motor::command::split_gain;
use crate::motor::Register;

/// Raw per-motor status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorStatus {
    raw: u8,
}

impl MotorStatus {
    pub const CONTROL_ON: u8 = 0x01;
    pub const IS_RAMPING: u8 = 0x02;
    pub const IS_POWERED: u8 = 0x04;
    pub const POS_CTRL_ON: u8 = 0x08;
    pub const IN_BRAKE_MODE: u8 = 0x10;
    pub const OVERLOADED: u8 = 0x20;
    pub const IN_TIME_MODE: u8 = 0x40;
    pub const IS_STALLED: u8 = 0x80;

    pub fn from_raw(raw: u8) -> Self {
        Self { raw }
    }

    #[inline]
    pub fn raw(&self) -> u8 {
        self.raw
    }

    #[inline]
    fn has(&self, mask: u8) -> bool {
        self.raw & mask != 0
    }

    /// Speed is regulated by the board (fixed speed) rather than raw power
    pub fn control_on(&self) -> bool {
        self.has(Self::CONTROL_ON)
    }

    pub fn is_ramping(&self) -> bool {
        self.has(Self::IS_RAMPING)
    }

    pub fn is_powered(&self) -> bool {
        self.has(Self::IS_POWERED)
    }

    /// A tacho move (or hold) is in progress; clears when the target is reached
    pub fn position_control_on(&self) -> bool {
        self.has(Self::POS_CTRL_ON)
    }

    pub fn in_brake_mode(&self) -> bool {
        self.has(Self::IN_BRAKE_MODE)
    }

    pub fn is_overloaded(&self) -> bool {
        self.has(Self::OVERLOADED)
    }

    /// A timed run is in progress; clears when the time is up
    pub fn in_time_mode(&self) -> bool {
        self.has(Self::IN_TIME_MODE)
    }

    pub fn is_stalled(&self) -> bool {
        self.has(Self::IS_STALLED)
    }

    pub fn flags(&self) -> MotorStatusFlags {
        MotorStatusFlags {
            control_on: self.control_on(),
            is_ramping: self.is_ramping(),
            is_powered: self.is_powered(),
            position_control_on: self.position_control_on(),
            in_brake_mode: self.in_brake_mode(),
            is_overloaded: self.is_overloaded(),
            in_time_mode: self.in_time_mode(),
            is_stalled: self.is_stalled(),
        }
    }
}

/// Decoded status byte, one boolean per bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorStatusFlags {
    pub control_on: bool,
    pub is_ramping: bool,
    pub is_powered: bool,
    pub position_control_on: bool,
    pub in_brake_mode: bool,
    pub is_overloaded: bool,
    pub in_time_mode: bool,
    pub is_stalled: bool,
}

/// Gains and settle parameters for the board's position and speed loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerformanceParameters {
    pub kp_tacho: u16,
    pub ki_tacho: u16,
    pub kd_tacho: u16,
    pub kp_speed: u16,
    pub ki_speed: u16,
    pub kd_speed: u16,
    pub pass_count: u8,
    pub tolerance: u8,
}

impl PerformanceParameters {
    /// 15-byte block starting at the position Kp register
    pub fn to_block(&self) -> [u8; 15] {
        let mut block = [0u8; 15];
        block[0] = Register::PositionKp.addr();
        let gains = [
            self.kp_tacho,
            self.ki_tacho,
            self.kd_tacho,
            self.kp_speed,
            self.ki_speed,
            self.kd_speed,
        ];
        for (i, gain) in gains.into_iter().enumerate() {
            block[1 + 2 * i..3 + 2 * i].copy_from_slice(&split_gain(gain));
        }
        block[13] = self.pass_count;
        block[14] = self.tolerance;
        block
    }
}

/// Battery reading as reported by the board
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub raw: u8,
    pub voltage: f32,
}
