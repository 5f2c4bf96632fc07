// Register-level I2C transport for the SmartDrive
//
// Every transfer names the device address, so the target is re-selected on
// each access and other devices may share the bus between calls.

use embedded_hal::i2c::{Error as _, I2c};
use tracing::debug;

use super::registers::Register;
use super::{Result, SmartDriveError};

/// Lowest and highest usable 7-bit addresses (the rest are reserved by I2C)
pub const MIN_ADDRESS: u8 = 0x08;
pub const MAX_ADDRESS: u8 = 0x77;

/// SmartDrive register bus - reads and writes registers of one device
#[derive(Debug)]
pub struct RegisterBus<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> RegisterBus<I2C> {
    /// Wrap an I2C bus for the device at `address`
    pub fn new(i2c: I2C, address: u8) -> Result<Self> {
        if !(MIN_ADDRESS..=MAX_ADDRESS).contains(&address) {
            return Err(SmartDriveError::InvalidAddress { address });
        }
        Ok(Self { i2c, address })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    fn bus_error(&self, register: u8, err: I2C::Error) -> SmartDriveError {
        SmartDriveError::Bus {
            address: self.address,
            register,
            kind: err.kind(),
        }
    }

    /// Write a single byte to a register
    pub fn write_byte(&mut self, register: Register, value: u8) -> Result<()> {
        debug!("Write u8 to 0x{:02X}: reg={:?}, value=0x{:02X}", self.address, register, value);
        self.i2c
            .write(self.address, &[register.addr(), value])
            .map_err(|e| self.bus_error(register.addr(), e))
    }

    /// Write a block whose first byte is the start register
    pub fn write_block(&mut self, block: &[u8]) -> Result<()> {
        let Some(&start) = block.first() else {
            return Ok(());
        };
        debug_assert!(
            lookup(start).is_some_and(|reg| Register::block_fits(reg, block.len() - 1)),
            "block {block:02X?} does not match the register map"
        );
        debug!("Write block to 0x{:02X}: {:02X?}", self.address, block);
        self.i2c
            .write(self.address, block)
            .map_err(|e| self.bus_error(start, e))
    }

    /// Read a single byte from a register
    pub fn read_byte(&mut self, register: Register) -> Result<u8> {
        let [value] = self.read_bytes::<1>(register)?;
        Ok(value)
    }

    /// Read two bytes (little-endian) from a register
    pub fn read_word(&mut self, register: Register) -> Result<u16> {
        let bytes = self.read_bytes::<2>(register)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Read `N` consecutive bytes starting at a register
    pub fn read_bytes<const N: usize>(&mut self, register: Register) -> Result<[u8; N]> {
        debug_assert!(N <= register.width(), "{register:?} is only {} bytes wide", register.width());
        let mut buf = [0u8; N];
        self.i2c
            .write_read(self.address, &[register.addr()], &mut buf)
            .map_err(|e| self.bus_error(register.addr(), e))?;
        debug!("Read from 0x{:02X}: reg={:?}, bytes={:02X?}", self.address, register, buf);
        Ok(buf)
    }

    /// Give the underlying bus back
    pub fn release(self) -> I2C {
        self.i2c
    }
}

fn lookup(addr: u8) -> Option<Register> {
    Register::ALL.iter().copied().find(|r| r.addr() == addr)
}
