// Bus defaults, poll timing, speed presets
use std::time::Duration;

// I2C bus channel, opened as /dev/i2c-<channel>
pub const DEFAULT_BUS: u8 = 1;

// Board default is 0x36 in 8-bit form; the bus wants the 7-bit address
pub const DEFAULT_ADDRESS: u8 = 0x36 >> 1;

// Status byte is not valid until the board has latched the new command
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

// Poll intervals for the completion waits
pub const TIME_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const TACHO_POLL_INTERVAL: Duration = Duration::from_millis(30);

// Convenience speeds, any value in 0..=MAX_SPEED works
pub const SPEED_FULL: u8 = 90;
pub const SPEED_MEDIUM: u8 = 60;
pub const SPEED_SLOW: u8 = 25;

// Raw battery byte to reading, multiplier not verified against hardware
pub const VOLTAGE_MULTIPLIER: f32 = 212.7;
