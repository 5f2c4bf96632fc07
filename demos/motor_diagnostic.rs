// SmartDrive diagnostic: READ-ONLY check of the board connection
//
// This tool does NOT write anything to the board - it's completely safe.
// Use this first before running motor_test.
//
// Usage: cargo run --example motor_diagnostic -- [bus] [address]
// Example: cargo run --example motor_diagnostic -- 1 0x1b

use smartdrive::config::{DEFAULT_ADDRESS, DEFAULT_BUS};
use smartdrive::motor::{Motor, SmartDrive};

const MOTORS: [Motor; 2] = [Motor::One, Motor::Two];

fn parse_u8(arg: &str) -> Option<u8> {
    match arg.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => arg.parse().ok(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let bus = args.next().and_then(|a| parse_u8(&a)).unwrap_or(DEFAULT_BUS);
    let address = args.next().and_then(|a| parse_u8(&a)).unwrap_or(DEFAULT_ADDRESS);

    println!("SmartDrive Diagnostic (READ-ONLY)");
    println!("This tool only READS from the board - no writes, no movement");
    println!();
    println!("I2C bus: /dev/i2c-{}", bus);
    println!("Device address: 0x{:02X}", address);
    println!();

    println!("Step 1: Opening I2C bus...");
    let mut drive = match SmartDrive::open(bus, address) {
        Ok(drive) => {
            println!("  ok: bus opened");
            drive
        }
        Err(e) => {
            println!("  FAILED to open bus: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check that I2C is enabled and /dev/i2c-{} exists", bus);
            println!("  - Check that your user may access the device (i2c group)");
            return Err(e.into());
        }
    };
    println!();

    println!("Step 2: Reading battery...");
    match drive.read_battery() {
        Ok(battery) => println!("  Battery: {:.1} (raw {})", battery.voltage, battery.raw),
        Err(e) => {
            println!("  ERROR - {}", e);
            println!("  - Is the board powered and wired to SDA/SCL?");
            println!("  - Try `i2cdetect -y {}` to see which addresses respond", bus);
            return Err(e.into());
        }
    }
    println!();

    println!("Step 3: Reading motor registers...");
    println!();
    for motor in MOTORS {
        println!("  === {} ===", motor);

        match drive.read_tachometer_position(motor) {
            Ok(pos) => println!("    Position: {} ({})", pos, pos as i32),
            Err(e) => println!("    Position: ERROR - {}", e),
        }

        match drive.motor_status(motor) {
            Ok(status) => {
                let flags = status.flags();
                println!("    Status:   0x{:02X}", status.raw());
                println!("      powered={} ramping={} brake={}", flags.is_powered, flags.is_ramping, flags.in_brake_mode);
                println!("      time_mode={} position_control={}", flags.in_time_mode, flags.position_control_on);
                println!("      overloaded={} stalled={}", flags.is_overloaded, flags.is_stalled);
            }
            Err(e) => println!("    Status:   ERROR - {}", e),
        }

        match drive.read_motor_current(motor) {
            Ok(current) => println!("    Current:  {} (raw)", current),
            Err(e) => println!("    Current:  ERROR - {}", e),
        }
        println!();
    }

    println!("Step 4: Reading PID parameters...");
    match drive.read_performance_parameters() {
        Ok(params) => {
            println!("  Position loop: Kp={} Ki={} Kd={}", params.kp_tacho, params.ki_tacho, params.kd_tacho);
            println!("  Speed loop:    Kp={} Ki={} Kd={}", params.kp_speed, params.ki_speed, params.kd_speed);
            println!("  Pass count={} tolerance={}", params.pass_count, params.tolerance);
        }
        Err(e) => println!("  ERROR - {}", e),
    }
    println!();

    println!("Diagnostic complete.");
    println!("Next step: run 'cargo run --example motor_test' with the motors free to spin");

    Ok(())
}
