//! Register-level driver for the SmartDrive dual DC motor controller.
//!
//! The board runs its own PID loops; this crate loads motion commands into its
//! register map over I2C, reads back encoder positions, battery and status, and
//! tunes the loop gains.
//!
//! ```no_run
//! use smartdrive::motor::{Completion, Direction, Motor, SmartDrive, StopAction};
//!
//! # fn main() -> smartdrive::motor::Result<()> {
//! let mut drive = SmartDrive::open(1, smartdrive::config::DEFAULT_ADDRESS)?;
//! drive.run_degrees(Motor::One, Direction::Forward, 50, 720, Completion::Wait, StopAction::Brake)?;
//! println!("battery: {}", drive.read_battery_voltage()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod messages;
pub mod motor;
