use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use smartdrive::config::{DEFAULT_ADDRESS, DEFAULT_BUS};
use smartdrive::messages::PerformanceParameters;
use smartdrive::motor::{self, Completion, SmartDrive};

/// Command-line control for a SmartDrive motor board
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// I2C bus number, opened as /dev/i2c-<bus>
    #[arg(short, long, default_value_t = DEFAULT_BUS)]
    bus: u8,

    /// 7-bit device address (hex with 0x prefix, or decimal)
    #[arg(short, long, default_value_t = DEFAULT_ADDRESS, value_parser = parse_address)]
    address: u8,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,

    /// Read motor 2 status from the motor 1 register (old driver behavior)
    #[arg(long)]
    legacy_status: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run motor(s) unlimited, for a time, or to a tacho target
    Run(RunArgs),
    /// Stop motor(s)
    Stop {
        #[arg(short, long, value_enum, default_value_t = MotorArg::Both)]
        motor: MotorArg,
        #[arg(short, long, value_enum, default_value_t = StopArg::Brake)]
        stop: StopArg,
    },
    /// Show the status flags of one motor
    Status {
        #[arg(short, long, value_enum)]
        motor: MotorArg,
    },
    /// Read the encoder position of one motor
    Position {
        #[arg(short, long, value_enum)]
        motor: MotorArg,
    },
    /// Read the motor current of one motor
    Current {
        #[arg(short, long, value_enum)]
        motor: MotorArg,
    },
    /// Read the battery voltage
    Battery,
    /// Read or write PID parameters
    #[command(subcommand)]
    Pid(PidCommand),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(short, long, value_enum, default_value_t = MotorArg::Both)]
    motor: MotorArg,

    #[arg(short, long, value_enum, default_value_t = DirectionArg::Forward)]
    direction: DirectionArg,

    /// Speed, 0 to 100
    #[arg(long, default_value_t = smartdrive::config::SPEED_SLOW)]
    speed: u8,

    /// Run for this many seconds
    #[arg(long, conflicts_with_all = ["degrees", "rotations", "tacho"])]
    seconds: Option<u8>,

    /// Turn by this many degrees
    #[arg(long, conflicts_with_all = ["rotations", "tacho"], allow_negative_numbers = true)]
    degrees: Option<i32>,

    /// Turn by this many rotations
    #[arg(long, conflicts_with = "tacho", allow_negative_numbers = true)]
    rotations: Option<i32>,

    /// Move to this absolute tacho count
    #[arg(long)]
    tacho: Option<u32>,

    /// What to do once the move ends
    #[arg(short, long, value_enum, default_value_t = StopArg::Brake)]
    stop: StopArg,

    /// Block until the move is done
    #[arg(short, long)]
    wait: bool,

    /// Give up waiting after this many milliseconds
    #[arg(long, requires = "wait")]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum PidCommand {
    /// Print the current gains and settle parameters
    Get,
    /// Write gains and settle parameters
    Set {
        #[arg(long)]
        kp_tacho: u16,
        #[arg(long)]
        ki_tacho: u16,
        #[arg(long)]
        kd_tacho: u16,
        #[arg(long)]
        kp_speed: u16,
        #[arg(long)]
        ki_speed: u16,
        #[arg(long)]
        kd_speed: u16,
        #[arg(long)]
        pass_count: u8,
        #[arg(long)]
        tolerance: u8,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MotorArg {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
    Both,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StopArg {
    Float,
    Brake,
    Hold,
}

impl From<MotorArg> for motor::Motor {
    fn from(arg: MotorArg) -> Self {
        match arg {
            MotorArg::One => motor::Motor::One,
            MotorArg::Two => motor::Motor::Two,
            MotorArg::Both => motor::Motor::Both,
        }
    }
}

impl From<DirectionArg> for motor::Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Forward => motor::Direction::Forward,
            DirectionArg::Reverse => motor::Direction::Reverse,
        }
    }
}

impl From<StopArg> for motor::StopAction {
    fn from(arg: StopArg) -> Self {
        match arg {
            StopArg::Float => motor::StopAction::Float,
            StopArg::Brake => motor::StopAction::Brake,
            StopArg::Hold => motor::StopAction::BrakeHold,
        }
    }
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}

fn main() {
    // Setup logging (set RUST_LOG=debug to see every register transfer)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("smartdrive: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut drive =
        SmartDrive::open(cli.bus, cli.address)?.with_legacy_status_register(cli.legacy_status);
    let json = cli.json;

    match cli.command {
        Command::Run(args) => run_motion(&mut drive, args)?,
        Command::Stop { motor, stop } => drive.stop_motor(motor.into(), stop.into())?,
        Command::Status { motor } => {
            let flags = drive.motor_status_flags(motor.into())?;
            report(json, &flags, || format!("{flags:#?}"))?;
        }
        Command::Position { motor } => {
            let position = drive.read_tachometer_position(motor.into())?;
            report(json, &position, || position.to_string())?;
        }
        Command::Current { motor } => {
            let current = drive.read_motor_current(motor.into())?;
            report(json, &current, || current.to_string())?;
        }
        Command::Battery => {
            let battery = drive.read_battery()?;
            report(json, &battery, || format!("{:.1} (raw {})", battery.voltage, battery.raw))?;
        }
        Command::Pid(PidCommand::Get) => {
            let params = drive.read_performance_parameters()?;
            report(json, &params, || format!("{params:#?}"))?;
        }
        Command::Pid(PidCommand::Set {
            kp_tacho,
            ki_tacho,
            kd_tacho,
            kp_speed,
            ki_speed,
            kd_speed,
            pass_count,
            tolerance,
        }) => {
            drive.set_performance_parameters(&PerformanceParameters {
                kp_tacho,
                ki_tacho,
                kd_tacho,
                kp_speed,
                ki_speed,
                kd_speed,
                pass_count,
                tolerance,
            })?;
        }
    }
    Ok(())
}

fn run_motion<I2C, D>(
    drive: &mut SmartDrive<I2C, D>,
    args: RunArgs,
) -> Result<(), motor::SmartDriveError>
where
    I2C: embedded_hal::i2c::I2c,
    D: embedded_hal::delay::DelayNs,
{
    let motor = args.motor.into();
    let direction = args.direction.into();
    let stop = args.stop.into();
    let completion = match (args.wait, args.timeout_ms) {
        (false, _) => Completion::Return,
        (true, None) => Completion::Wait,
        (true, Some(ms)) => Completion::WaitFor(Duration::from_millis(ms)),
    };

    if let Some(seconds) = args.seconds {
        drive.run_seconds(motor, direction, args.speed, seconds, completion, stop)
    } else if let Some(degrees) = args.degrees {
        drive.run_degrees(motor, direction, args.speed, degrees, completion, stop)
    } else if let Some(rotations) = args.rotations {
        drive.run_rotations(motor, direction, args.speed, rotations, completion, stop)
    } else if let Some(tacho) = args.tacho {
        drive.run_tacho(motor, args.speed, tacho, completion, stop)
    } else {
        drive.run_unlimited(motor, direction, args.speed)
    }
}

fn report<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}
