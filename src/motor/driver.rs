// High-level client for the SmartDrive board
//
// Turns motion and query requests into register transfers, and polls the
// status bytes when the caller wants to block until a move is done.

use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use linux_embedded_hal::{Delay, I2cdev};
use tracing::{debug, info, warn};

use super::bus::RegisterBus;
use super::command::{
    check_speed, rotations_to_degrees, setpoint_block, signed_displacement, signed_speed,
    speed_block, stop_code, ControlByte, START_BOTH,
};
use super::registers::Register;
use super::{Channel, Direction, Motor, Result, SmartDriveError, StopAction};
use crate::config::{SETTLE_DELAY, TACHO_POLL_INTERVAL, TIME_POLL_INTERVAL, VOLTAGE_MULTIPLIER};
use crate::messages::{BatteryReading, MotorStatus, MotorStatusFlags, PerformanceParameters};

/// What a motion command does after the board accepted it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Return as soon as the command is written
    Return,
    /// Block until the move is done, however long that takes
    Wait,
    /// Block until the move is done, or fail with `Timeout`
    WaitFor(Duration),
}

impl Completion {
    fn timeout(self) -> Option<Option<Duration>> {
        match self {
            Completion::Return => None,
            Completion::Wait => Some(None),
            Completion::WaitFor(limit) => Some(Some(limit)),
        }
    }
}

/// Battery reading from the raw voltage byte
pub fn battery_voltage_from_raw(raw: u8) -> f32 {
    f32::from(raw) * VOLTAGE_MULTIPLIER
}

/// SmartDrive motor controller client
#[derive(Debug)]
pub struct SmartDrive<I2C: I2c, D: DelayNs> {
    bus: RegisterBus<I2C>,
    delay: D,
    legacy_status_register: bool,
    stop_on_drop: bool,
}

impl SmartDrive<I2cdev, Delay> {
    /// Open `/dev/i2c-<channel>` and talk to the board at `address`
    pub fn open(channel: u8, address: u8) -> Result<Self> {
        let path = format!("/dev/i2c-{channel}");
        info!("Opening SmartDrive on {} at 0x{:02X}", path, address);
        let i2c = I2cdev::new(&path).map_err(|e| SmartDriveError::Open {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        Self::new(i2c, Delay, address)
    }
}

impl<I2C: I2c, D: DelayNs> SmartDrive<I2C, D> {
    /// Create a client over an already opened bus
    pub fn new(i2c: I2C, delay: D, address: u8) -> Result<Self> {
        Ok(Self {
            bus: RegisterBus::new(i2c, address)?,
            delay,
            legacy_status_register: false,
            stop_on_drop: false,
        })
    }

    /// Make status queries for motor 2 read the motor 1 register, matching
    /// older host drivers for this board
    pub fn with_legacy_status_register(mut self, legacy: bool) -> Self {
        self.legacy_status_register = legacy;
        self
    }

    /// Float-stop both motors when the client is dropped
    pub fn stop_on_drop(mut self, stop: bool) -> Self {
        self.stop_on_drop = stop;
        self
    }

    pub fn address(&self) -> u8 {
        self.bus.address()
    }

    /// Write a raw byte to the command register
    pub fn command(&mut self, cmd: u8) -> Result<()> {
        info!("Running command 0x{:02X}", cmd);
        self.bus.write_byte(Register::Command, cmd)
    }

    // === Motion ===

    /// Run at `speed` until stopped
    pub fn run_unlimited(&mut self, motor: Motor, direction: Direction, speed: u8) -> Result<()> {
        check_speed(speed)?;
        info!("Running {} {:?} at speed {}", motor, direction, speed);

        let ctrl = ControlByte::for_move(ControlByte::SPEED, StopAction::Brake, motor);
        let speed = signed_speed(direction, speed);
        for &channel in motor.channels() {
            self.bus.write_block(&speed_block(channel, speed, 0, ctrl))?;
        }
        self.start_if_both(motor)
    }

    /// Run at `speed` for `seconds`, then apply `stop`
    pub fn run_seconds(
        &mut self,
        motor: Motor,
        direction: Direction,
        speed: u8,
        seconds: u8,
        completion: Completion,
        stop: StopAction,
    ) -> Result<()> {
        check_speed(speed)?;
        info!(
            "Running {} {:?} at speed {} for {}s, then {:?}",
            motor, direction, speed, seconds, stop
        );

        let ctrl = ControlByte::for_move(ControlByte::SPEED | ControlByte::TIME, stop, motor);
        let speed = signed_speed(direction, speed);
        for &channel in motor.channels() {
            self.bus.write_block(&speed_block(channel, speed, seconds, ctrl))?;
        }
        self.start_if_both(motor)?;

        if let Some(timeout) = completion.timeout() {
            self.pause(SETTLE_DELAY);
            self.wait_until_time_done(motor, timeout)?;
        }
        Ok(())
    }

    /// Turn by `degrees` of tacho count relative to the current position
    pub fn run_degrees(
        &mut self,
        motor: Motor,
        direction: Direction,
        speed: u8,
        degrees: i32,
        completion: Completion,
        stop: StopAction,
    ) -> Result<()> {
        check_speed(speed)?;
        info!(
            "Turning {} {:?} by {} degrees at speed {}, then {:?}",
            motor, direction, degrees, speed, stop
        );

        let target = signed_displacement(direction, degrees).to_le_bytes();
        let mode = ControlByte::SPEED | ControlByte::TACHO | ControlByte::RELATIVE;
        self.load_setpoint(motor, target, speed, mode, stop)?;
        self.finish_tacho(motor, completion)
    }

    /// Turn by whole rotations (360 tacho counts each)
    pub fn run_rotations(
        &mut self,
        motor: Motor,
        direction: Direction,
        speed: u8,
        rotations: i32,
        completion: Completion,
        stop: StopAction,
    ) -> Result<()> {
        let degrees = rotations_to_degrees(rotations)?;
        self.run_degrees(motor, direction, speed, degrees, completion, stop)
    }

    /// Move to an absolute tacho count
    pub fn run_tacho(
        &mut self,
        motor: Motor,
        speed: u8,
        tacho_count: u32,
        completion: Completion,
        stop: StopAction,
    ) -> Result<()> {
        check_speed(speed)?;
        info!(
            "Moving {} to tacho {} at speed {}, then {:?}",
            motor, tacho_count, speed, stop
        );

        let mode = ControlByte::SPEED | ControlByte::TACHO;
        self.load_setpoint(motor, tacho_count.to_le_bytes(), speed, mode, stop)?;
        self.finish_tacho(motor, completion)
    }

    /// Stop the selected motor(s)
    pub fn stop_motor(&mut self, motor: Motor, action: StopAction) -> Result<()> {
        info!("Stopping {} ({:?})", motor, action);
        self.bus.write_byte(Register::Command, stop_code(motor, action))
    }

    fn load_setpoint(
        &mut self,
        motor: Motor,
        target: [u8; 4],
        speed: u8,
        mode: u8,
        stop: StopAction,
    ) -> Result<()> {
        let ctrl = ControlByte::for_move(mode, stop, motor);
        for &channel in motor.channels() {
            self.bus.write_block(&setpoint_block(channel, target, speed, ctrl))?;
        }
        self.start_if_both(motor)
    }

    fn finish_tacho(&mut self, motor: Motor, completion: Completion) -> Result<()> {
        if let Some(timeout) = completion.timeout() {
            self.pause(SETTLE_DELAY);
            self.wait_until_tacho_done(motor, timeout)?;
        }
        Ok(())
    }

    /// Both motors get their blocks without GO, then start together
    fn start_if_both(&mut self, motor: Motor) -> Result<()> {
        if motor == Motor::Both {
            self.bus.write_byte(Register::Command, START_BOTH)?;
        }
        Ok(())
    }

    // === Completion polling ===

    /// True once no selected motor is in time mode
    pub fn is_time_done(&mut self, motor: Motor) -> Result<bool> {
        self.status_bits_clear(motor, MotorStatus::IN_TIME_MODE)
    }

    /// True once no selected motor is under position control
    pub fn is_tacho_done(&mut self, motor: Motor) -> Result<bool> {
        self.status_bits_clear(motor, MotorStatus::POS_CTRL_ON)
    }

    /// Poll every second until the timed run ends
    pub fn wait_until_time_done(&mut self, motor: Motor, timeout: Option<Duration>) -> Result<()> {
        self.poll_until_clear(motor, MotorStatus::IN_TIME_MODE, TIME_POLL_INTERVAL, timeout)
    }

    /// Poll every 30 ms until the tacho move ends
    pub fn wait_until_tacho_done(&mut self, motor: Motor, timeout: Option<Duration>) -> Result<()> {
        self.poll_until_clear(motor, MotorStatus::POS_CTRL_ON, TACHO_POLL_INTERVAL, timeout)
    }

    fn status_bits_clear(&mut self, motor: Motor, mask: u8) -> Result<bool> {
        // unselected motors count as done
        let mut done = true;
        for &channel in motor.channels() {
            let status = self.bus.read_byte(Register::status(channel))?;
            done &= status & mask == 0;
        }
        Ok(done)
    }

    fn poll_until_clear(
        &mut self,
        motor: Motor,
        mask: u8,
        interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.status_bits_clear(motor, mask)? {
                debug!("{} done after {:?}", motor, started.elapsed());
                return Ok(());
            }
            let waited = started.elapsed();
            if timeout.is_some_and(|limit| waited >= limit) {
                warn!("Gave up waiting for {} after {:?}", motor, waited);
                return Err(SmartDriveError::Timeout { motor, waited });
            }
            self.pause(interval);
        }
    }

    fn pause(&mut self, duration: Duration) {
        let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        self.delay.delay_ms(ms);
    }

    // === Queries ===

    /// Battery reading; the multiplier has not been checked against hardware
    pub fn read_battery_voltage(&mut self) -> Result<f32> {
        Ok(self.read_battery()?.voltage)
    }

    pub fn read_battery(&mut self) -> Result<BatteryReading> {
        let raw = self.bus.read_byte(Register::BatteryVoltage)?;
        Ok(BatteryReading {
            raw,
            voltage: battery_voltage_from_raw(raw),
        })
    }

    /// Encoder position of a single motor
    pub fn read_tachometer_position(&mut self, motor: Motor) -> Result<u32> {
        let channel = single(motor)?;
        let bytes = self.bus.read_bytes::<4>(Register::position(channel))?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Motor current, raw board units
    pub fn read_motor_current(&mut self, motor: Motor) -> Result<u16> {
        let channel = single(motor)?;
        self.bus.read_word(Register::current(channel))
    }

    /// Tasks byte of a single motor
    pub fn read_tasks(&mut self, motor: Motor) -> Result<u8> {
        let channel = single(motor)?;
        self.bus.read_byte(Register::tasks(channel))
    }

    /// Status byte of a single motor
    pub fn motor_status(&mut self, motor: Motor) -> Result<MotorStatus> {
        let channel = single(motor)?;
        let register = if self.legacy_status_register {
            Register::StatusM1
        } else {
            Register::status(channel)
        };
        let raw = self.bus.read_byte(register)?;
        Ok(MotorStatus::from_raw(raw))
    }

    pub fn motor_status_flags(&mut self, motor: Motor) -> Result<MotorStatusFlags> {
        Ok(self.motor_status(motor)?.flags())
    }

    // === PID tuning ===

    /// Write all six gains plus pass count and tolerance in one block
    pub fn set_performance_parameters(&mut self, params: &PerformanceParameters) -> Result<()> {
        info!("Setting performance parameters: {:?}", params);
        self.bus.write_block(&params.to_block())
    }

    pub fn read_performance_parameters(&mut self) -> Result<PerformanceParameters> {
        Ok(PerformanceParameters {
            kp_tacho: self.bus.read_word(Register::PositionKp)?,
            ki_tacho: self.bus.read_word(Register::PositionKi)?,
            kd_tacho: self.bus.read_word(Register::PositionKd)?,
            kp_speed: self.bus.read_word(Register::SpeedKp)?,
            ki_speed: self.bus.read_word(Register::SpeedKi)?,
            kd_speed: self.bus.read_word(Register::SpeedKd)?,
            pass_count: self.bus.read_byte(Register::PassCount)?,
            tolerance: self.bus.read_byte(Register::PassTolerance)?,
        })
    }
}

fn single(motor: Motor) -> Result<Channel> {
    motor
        .single()
        .ok_or(SmartDriveError::SingleMotorRequired { motor })
}

impl<I2C: I2c, D: DelayNs> Drop for SmartDrive<I2C, D> {
    fn drop(&mut self) {
        if !self.stop_on_drop {
            return;
        }
        // Try to stop motors when the client is dropped
        if let Err(e) = self.stop_motor(Motor::Both, StopAction::Float) {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::fake::{FakeDelay, FakeI2c};

    const ADDR: u8 = 0x1B;

    fn setup() -> (SmartDrive<FakeI2c, FakeDelay>, FakeI2c, FakeDelay) {
        let i2c = FakeI2c::new();
        let delay = FakeDelay::new();
        let drive = SmartDrive::new(i2c.clone(), delay.clone(), ADDR).unwrap();
        (drive, i2c, delay)
    }

    #[test]
    fn test_relative_degrees_single_motor() {
        let (mut drive, i2c, delay) = setup();
        drive
            .run_degrees(Motor::One, Direction::Forward, 50, 720, Completion::Return, StopAction::Brake)
            .unwrap();

        let ctrl = ControlByte::SPEED
            | ControlByte::TACHO
            | ControlByte::RELATIVE
            | ControlByte::BRAKE
            | ControlByte::GO;
        let [b0, b1, b2, b3] = 720i32.to_le_bytes();
        assert_eq!(i2c.writes(), vec![vec![0x42, b0, b1, b2, b3, 50, 0, 0, ctrl]]);
        assert!(i2c.reads().is_empty());
        assert!(delay.pauses().is_empty());
    }

    #[test]
    fn test_unlimited_both_motors_starts_together() {
        let (mut drive, i2c, _) = setup();
        drive.run_unlimited(Motor::Both, Direction::Reverse, 30).unwrap();

        let ctrl = ControlByte::SPEED | ControlByte::BRAKE;
        let speed = (-30i8) as u8;
        assert_eq!(
            i2c.writes(),
            vec![
                vec![0x46, speed, 0, 0, ctrl],
                vec![0x4E, speed, 0, 0, ctrl],
                vec![0x41, START_BOTH],
            ]
        );
    }

    #[test]
    fn test_unlimited_single_motor_sets_go() {
        let (mut drive, i2c, _) = setup();
        drive.run_unlimited(Motor::Two, Direction::Forward, 30).unwrap();

        let ctrl = ControlByte::SPEED | ControlByte::BRAKE | ControlByte::GO;
        assert_eq!(i2c.writes(), vec![vec![0x4E, 30, 0, 0, ctrl]]);
    }

    #[test]
    fn test_speed_checked_before_bus() {
        let (mut drive, i2c, _) = setup();
        let result = drive.run_unlimited(Motor::One, Direction::Forward, 101);
        assert!(matches!(result, Err(SmartDriveError::InvalidSpeed { .. })));
        assert!(i2c.transfers().is_empty());
    }

    #[test]
    fn test_stop_codes_on_command_register() {
        let (mut drive, i2c, _) = setup();
        drive.stop_motor(Motor::Two, StopAction::Float).unwrap();
        drive.stop_motor(Motor::Two, StopAction::Brake).unwrap();

        let writes = i2c.writes();
        assert_eq!(writes, vec![vec![0x41, b'b'], vec![0x41, b'B']]);
        assert_ne!(writes[0], writes[1]);
    }

    #[test]
    fn test_seconds_waits_for_time_bit() {
        let (mut drive, i2c, delay) = setup();
        i2c.script(0x5A, &[MotorStatus::IN_TIME_MODE, MotorStatus::IN_TIME_MODE, 0]);
        i2c.script(0x5B, &[0, MotorStatus::IN_TIME_MODE, 0]);

        drive
            .run_seconds(Motor::Both, Direction::Forward, 40, 3, Completion::Wait, StopAction::BrakeHold)
            .unwrap();

        let ctrl = ControlByte::SPEED | ControlByte::TIME | ControlByte::BRAKE | ControlByte::HOLD_ON;
        assert_eq!(
            i2c.writes(),
            vec![
                vec![0x46, 40, 3, 0, ctrl],
                vec![0x4E, 40, 3, 0, ctrl],
                vec![0x41, START_BOTH],
            ]
        );
        assert_eq!(i2c.reads(), vec![0x5A, 0x5B, 0x5A, 0x5B, 0x5A, 0x5B]);
        // settle, then one pause per busy poll
        assert_eq!(
            delay.pauses(),
            vec![SETTLE_DELAY, TIME_POLL_INTERVAL, TIME_POLL_INTERVAL]
        );
    }

    #[test]
    fn test_polling_reads_only_selected_motor() {
        let (mut drive, i2c, _) = setup();
        // motor 1 busy must not matter when only motor 2 is selected
        i2c.set_memory(0x5A, &[MotorStatus::IN_TIME_MODE | MotorStatus::POS_CTRL_ON]);

        assert!(drive.is_time_done(Motor::Two).unwrap());
        assert!(drive.is_tacho_done(Motor::Two).unwrap());
        assert_eq!(i2c.reads(), vec![0x5B, 0x5B]);

        assert!(!drive.is_time_done(Motor::One).unwrap());
        assert!(!drive.is_tacho_done(Motor::Both).unwrap());
    }

    #[test]
    fn test_time_and_tacho_bits_are_distinct() {
        let (mut drive, i2c, _) = setup();
        i2c.set_memory(0x5A, &[MotorStatus::IN_TIME_MODE]);
        assert!(!drive.is_time_done(Motor::One).unwrap());
        assert!(drive.is_tacho_done(Motor::One).unwrap());
    }

    #[test]
    fn test_wait_times_out() {
        let (mut drive, i2c, _) = setup();
        i2c.set_memory(0x5A, &[MotorStatus::POS_CTRL_ON]);

        let result = drive.run_tacho(
            Motor::One,
            20,
            5000,
            Completion::WaitFor(Duration::ZERO),
            StopAction::Float,
        );
        assert!(matches!(
            result,
            Err(SmartDriveError::Timeout {
                motor: Motor::One,
                ..
            })
        ));
    }

    #[test]
    fn test_absolute_tacho_only_waits_when_asked() {
        let (mut drive, i2c, delay) = setup();
        i2c.set_memory(0x5A, &[MotorStatus::POS_CTRL_ON]);

        drive
            .run_tacho(Motor::One, 20, 0x0001_0203, Completion::Return, StopAction::Float)
            .unwrap();

        let ctrl = ControlByte::SPEED | ControlByte::TACHO | ControlByte::GO;
        assert_eq!(
            i2c.writes(),
            vec![vec![0x42, 0x03, 0x02, 0x01, 0x00, 20, 0, 0, ctrl]]
        );
        assert!(i2c.reads().is_empty());
        assert!(delay.pauses().is_empty());
    }

    #[test]
    fn test_rotations_reverse() {
        let (mut drive, i2c, delay) = setup();
        i2c.script(0x5B, &[MotorStatus::POS_CTRL_ON, 0]);

        drive
            .run_rotations(Motor::Two, Direction::Reverse, 25, 2, Completion::Wait, StopAction::Float)
            .unwrap();

        let block = &i2c.writes()[0];
        assert_eq!(block[0], 0x4A);
        assert_eq!(i32::from_le_bytes([block[1], block[2], block[3], block[4]]), -720);
        assert_eq!(delay.pauses(), vec![SETTLE_DELAY, TACHO_POLL_INTERVAL]);
    }

    #[test]
    fn test_battery_voltage() {
        let (mut drive, i2c, _) = setup();
        i2c.set_memory(0x6E, &[100]);
        let voltage = drive.read_battery_voltage().unwrap();
        assert!((voltage - 21270.0).abs() < 0.01);
        assert!((battery_voltage_from_raw(1) - 212.7).abs() < 0.001);
    }

    #[test]
    fn test_read_failure_is_an_error() {
        let (mut drive, i2c, _) = setup();
        i2c.fail_transfers(true);
        assert!(matches!(
            drive.read_battery_voltage(),
            Err(SmartDriveError::Bus { register: 0x6E, .. })
        ));
        assert!(drive.read_tachometer_position(Motor::One).is_err());
    }

    #[test]
    fn test_tacho_position() {
        let (mut drive, i2c, _) = setup();
        i2c.set_memory(0x56, &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(drive.read_tachometer_position(Motor::Two).unwrap(), 0x1234_5678);
        assert!(matches!(
            drive.read_tachometer_position(Motor::Both),
            Err(SmartDriveError::SingleMotorRequired { motor: Motor::Both })
        ));
    }

    #[test]
    fn test_motor_status_register_choice() {
        let (mut drive, i2c, _) = setup();
        i2c.set_memory(0x5A, &[MotorStatus::IS_POWERED]);
        i2c.set_memory(0x5B, &[MotorStatus::IS_STALLED]);

        assert!(drive.motor_status_flags(Motor::Two).unwrap().is_stalled);
        assert!(matches!(
            drive.motor_status(Motor::Both),
            Err(SmartDriveError::SingleMotorRequired { .. })
        ));

        let mut legacy = drive.with_legacy_status_register(true);
        let status = legacy.motor_status(Motor::Two).unwrap();
        assert!(status.is_powered());
        assert!(!status.is_stalled());
    }

    #[test]
    fn test_performance_parameters() {
        let (mut drive, i2c, _) = setup();
        let params = PerformanceParameters {
            kp_tacho: 0x1234,
            ki_tacho: 1,
            kd_tacho: 0xFFFF,
            kp_speed: 256,
            ki_speed: 7,
            kd_speed: 0,
            pass_count: 4,
            tolerance: 10,
        };
        drive.set_performance_parameters(&params).unwrap();
        assert_eq!(i2c.writes(), vec![params.to_block().to_vec()]);

        // the fake keeps written bytes, so they read straight back
        assert_eq!(drive.read_performance_parameters().unwrap(), params);
        assert_eq!(
            i2c.reads(),
            vec![0x5E, 0x60, 0x62, 0x64, 0x66, 0x68, 0x6A, 0x6B]
        );
    }

    #[test]
    fn test_current_and_tasks() {
        let (mut drive, i2c, _) = setup();
        i2c.set_memory(0x72, &[0x10, 0x02]);
        i2c.set_memory(0x5C, &[0x03]);
        assert_eq!(drive.read_motor_current(Motor::Two).unwrap(), 0x0210);
        assert_eq!(drive.read_tasks(Motor::One).unwrap(), 0x03);
    }

    #[test]
    fn test_stop_on_drop() {
        let (drive, i2c, _) = setup();
        drop(drive.stop_on_drop(true));
        assert_eq!(i2c.writes(), vec![vec![0x41, b'c']]);

        let (drive, i2c, _) = setup();
        drop(drive);
        assert!(i2c.transfers().is_empty());
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            SmartDrive::new(FakeI2c::new(), FakeDelay::new(), 0x80),
            Err(SmartDriveError::InvalidAddress { address: 0x80 })
        ));
    }
}
