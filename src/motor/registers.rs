// SmartDrive register map
//
// Fixed 8-bit address space. Multi-byte fields are little-endian.
// Width and access are part of the table so encoders and readers share one source.

use super::Channel;

/// Whether the host may write a register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Register addresses for the SmartDrive board
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Command = 0x41, // 1 byte: start (0x53) or per-motor stop letters

    // Motor 1 command block
    SetpointM1 = 0x42, // 4 bytes, signed target
    SpeedM1 = 0x46,    // 1 byte, signed
    TimeM1 = 0x47,     // 1 byte, seconds
    CmdBM1 = 0x48,     // 1 byte, reserved
    CmdAM1 = 0x49,     // 1 byte, control byte

    // Motor 2 command block
    SetpointM2 = 0x4A,
    SpeedM2 = 0x4E,
    TimeM2 = 0x4F,
    CmdBM2 = 0x50,
    CmdAM2 = 0x51,

    // Read-only motor state
    PositionM1 = 0x52, // 4 bytes
    PositionM2 = 0x56, // 4 bytes
    StatusM1 = 0x5A,
    StatusM2 = 0x5B,
    TasksM1 = 0x5C,
    TasksM2 = 0x5D,

    // PID gains, 2 bytes each
    PositionKp = 0x5E,
    PositionKi = 0x60,
    PositionKd = 0x62,
    SpeedKp = 0x64,
    SpeedKi = 0x66,
    SpeedKd = 0x68,
    PassCount = 0x6A,
    PassTolerance = 0x6B,

    Checksum = 0x6C,

    // Power
    BatteryVoltage = 0x6E,
    ResetStatus = 0x6F,
    CurrentM1 = 0x70, // 2 bytes
    CurrentM2 = 0x72, // 2 bytes
}

impl Register {
    /// Every register, in address order
    pub const ALL: [Register; 30] = [
        Register::Command,
        Register::SetpointM1,
        Register::SpeedM1,
        Register::TimeM1,
        Register::CmdBM1,
        Register::CmdAM1,
        Register::SetpointM2,
        Register::SpeedM2,
        Register::TimeM2,
        Register::CmdBM2,
        Register::CmdAM2,
        Register::PositionM1,
        Register::PositionM2,
        Register::StatusM1,
        Register::StatusM2,
        Register::TasksM1,
        Register::TasksM2,
        Register::PositionKp,
        Register::PositionKi,
        Register::PositionKd,
        Register::SpeedKp,
        Register::SpeedKi,
        Register::SpeedKd,
        Register::PassCount,
        Register::PassTolerance,
        Register::Checksum,
        Register::BatteryVoltage,
        Register::ResetStatus,
        Register::CurrentM1,
        Register::CurrentM2,
    ];

    pub const fn addr(self) -> u8 {
        self as u8
    }

    /// Field width in bytes
    pub const fn width(self) -> usize {
        match self {
            Register::SetpointM1
            | Register::SetpointM2
            | Register::PositionM1
            | Register::PositionM2 => 4,
            Register::PositionKp
            | Register::PositionKi
            | Register::PositionKd
            | Register::SpeedKp
            | Register::SpeedKi
            | Register::SpeedKd
            | Register::CurrentM1
            | Register::CurrentM2 => 2,
            _ => 1,
        }
    }

    pub const fn access(self) -> Access {
        match self {
            Register::PositionM1
            | Register::PositionM2
            | Register::StatusM1
            | Register::StatusM2
            | Register::TasksM1
            | Register::TasksM2
            | Register::Checksum
            | Register::BatteryVoltage
            | Register::ResetStatus
            | Register::CurrentM1
            | Register::CurrentM2 => Access::ReadOnly,
            _ => Access::ReadWrite,
        }
    }

    pub const fn setpoint(channel: Channel) -> Register {
        match channel {
            Channel::One => Register::SetpointM1,
            Channel::Two => Register::SetpointM2,
        }
    }

    pub const fn speed(channel: Channel) -> Register {
        match channel {
            Channel::One => Register::SpeedM1,
            Channel::Two => Register::SpeedM2,
        }
    }

    pub const fn time(channel: Channel) -> Register {
        match channel {
            Channel::One => Register::TimeM1,
            Channel::Two => Register::TimeM2,
        }
    }

    pub const fn position(channel: Channel) -> Register {
        match channel {
            Channel::One => Register::PositionM1,
            Channel::Two => Register::PositionM2,
        }
    }

    pub const fn status(channel: Channel) -> Register {
        match channel {
            Channel::One => Register::StatusM1,
            Channel::Two => Register::StatusM2,
        }
    }

    pub const fn tasks(channel: Channel) -> Register {
        match channel {
            Channel::One => Register::TasksM1,
            Channel::Two => Register::TasksM2,
        }
    }

    pub const fn current(channel: Channel) -> Register {
        match channel {
            Channel::One => Register::CurrentM1,
            Channel::Two => Register::CurrentM2,
        }
    }

    /// True when `len` data bytes written from `start` end exactly on a
    /// register boundary and only touch writable registers
    pub fn block_fits(start: Register, len: usize) -> bool {
        let Some(first) = Register::ALL.iter().position(|&r| r == start) else {
            return false;
        };
        let mut covered = 0;
        let mut next_addr = start.addr();
        for &reg in &Register::ALL[first..] {
            if covered == len {
                break;
            }
            if reg.addr() != next_addr || reg.access() != Access::ReadWrite {
                return false;
            }
            covered += reg.width();
            next_addr = reg.addr().wrapping_add(reg.width() as u8);
        }
        covered == len
    }
}
