use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use roverlink_rover::config::POWER_OFF_DELAY_SECS;
use roverlink_rover::{ChannelRover, LedGroup, Rgb, RoverConfig};
use roverlink_transport::DEFAULT_BAUD_RATE;

use crate::exit::{io_error, rover_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod battery;
pub mod drive;
pub mod leds;
pub mod locate;
pub mod name;
pub mod power;
pub mod reset;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the battery charge in percent.
    Battery,
    /// Print the Bluetooth advertising name.
    Name,
    /// Drive at a speed towards a heading.
    Drive(DriveArgs),
    /// Stop both motors.
    Halt,
    /// Set light colours.
    Leds(LedsArgs),
    /// Wake, sleep or power off the controller.
    Power(PowerArgs),
    /// Reset yaw or the locator origin.
    Reset(ResetArgs),
    /// Read the position once.
    Locate(LocateArgs),
    /// Stream positions until interrupted.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Battery => battery::run(link, format),
        Command::Name => name::run(link, format),
        Command::Drive(args) => drive::run(args, link),
        Command::Halt => drive::halt(link),
        Command::Leds(args) => leds::run(args, link),
        Command::Power(args) => power::run(args, link),
        Command::Reset(args) => reset::run(args, link),
        Command::Locate(args) => locate::run(args, link, format),
        Command::Watch(args) => watch::run(args, link, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the controller. Accepted before or after the subcommand.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial device, or tcp://HOST:PORT for a serial bridge.
    #[arg(long, env = "ROVERLINK_PORT", value_name = "PORT", global = true)]
    pub port: Option<String>,
    /// Serial baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE, global = true)]
    pub baud: u32,
    /// Reply timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    pub timeout: String,
    /// Mirror wire traffic as hex text to a TCP listener.
    #[arg(long, value_name = "HOST:PORT", global = true)]
    pub debug_tee: Option<String>,
}

impl LinkArgs {
    pub fn rover_config(&self) -> CliResult<RoverConfig> {
        Ok(RoverConfig {
            reply_timeout: Some(parse_duration(&self.timeout)?),
            ..RoverConfig::default()
        })
    }

    /// Open the port and attach an engine.
    pub fn open(&self, config: RoverConfig) -> CliResult<ChannelRover> {
        let port = self.port.as_deref().ok_or_else(|| {
            CliError::new(USAGE, "no port given: pass --port or set ROVERLINK_PORT")
        })?;

        let opened = match &self.debug_tee {
            Some(addr) => {
                let tee = TcpStream::connect(addr)
                    .map_err(|err| io_error(&format!("debug tee {addr} unreachable"), err))?;
                roverlink_rover::open_with_debug(port, self.baud, Box::new(tee), config)
            }
            None => roverlink_rover::open(port, self.baud, config),
        };
        opened.map_err(|err| rover_error(&format!("open {port} failed"), err))
    }

    pub fn connect(&self) -> CliResult<ChannelRover> {
        self.open(self.rover_config()?)
    }
}

#[derive(Args, Debug)]
pub struct DriveArgs {
    /// Speed (0-255).
    pub speed: u8,
    /// Heading in degrees.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u16).range(0..360))]
    pub heading: u16,
    /// Drive backwards.
    #[arg(long)]
    pub reverse: bool,
    /// Keep driving for this long, then halt (e.g. 3s). The controller
    /// stops on its own about two seconds after the last drive command.
    #[arg(long = "for", value_name = "DURATION")]
    pub duration: Option<String>,
    /// Back away instead of halting when interrupted.
    #[arg(long)]
    pub backoff: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LedTarget {
    All,
    Left,
    Right,
    LeftHeadlight,
    RightHeadlight,
    LeftBrakelight,
    RightBrakelight,
}

impl From<LedTarget> for LedGroup {
    fn from(target: LedTarget) -> Self {
        match target {
            LedTarget::All => LedGroup::All,
            LedTarget::Left => LedGroup::Left,
            LedTarget::Right => LedGroup::Right,
            LedTarget::LeftHeadlight => LedGroup::LeftHeadlight,
            LedTarget::RightHeadlight => LedGroup::RightHeadlight,
            LedTarget::LeftBrakelight => LedGroup::LeftBrakelight,
            LedTarget::RightBrakelight => LedGroup::RightBrakelight,
        }
    }
}

#[derive(Args, Debug)]
pub struct LedsArgs {
    /// Which lights to set.
    #[arg(long, value_enum, default_value = "all")]
    pub group: LedTarget,
    /// Colour as R,G,B (0-255 each).
    #[arg(long, value_parser = parse_rgb, conflicts_with = "off", required_unless_present = "off")]
    pub rgb: Option<Rgb>,
    /// Turn the lights off.
    #[arg(long)]
    pub off: bool,
}

#[derive(Args, Debug, PartialEq, Eq)]
pub struct PowerArgs {
    #[command(subcommand)]
    pub action: PowerAction,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum PowerAction {
    /// Wake the controller.
    Wake,
    /// Put the controller to sleep.
    Sleep,
    /// Power off after a delay.
    Off {
        /// Seconds until power off.
        #[arg(long, default_value_t = POWER_OFF_DELAY_SECS)]
        delay: u8,
    },
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    #[command(subcommand)]
    pub target: ResetTarget,
}

#[derive(Subcommand, Debug)]
pub enum ResetTarget {
    /// Make the current heading zero.
    Yaw,
    /// Make the current position the locator origin.
    Locator,
}

/// Locator-to-map frame transform.
#[derive(Args, Debug, Default)]
pub struct TransformArgs {
    /// Rotation from the locator frame to the map frame, in degrees.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub rotation: f64,
    /// Map x of the locator origin.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub x_offset: f64,
    /// Map y of the locator origin.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub y_offset: f64,
}

impl TransformArgs {
    pub fn apply(&self, rover: &mut ChannelRover) {
        rover.set_rotation(self.rotation.to_radians());
        rover.set_offset(self.x_offset, self.y_offset);
    }
}

#[derive(Args, Debug)]
pub struct LocateArgs {
    #[command(flatten)]
    pub transform: TransformArgs,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Notification period in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub period: u16,
    /// Exit after printing N positions.
    #[arg(long)]
    pub count: Option<usize>,
    #[command(flatten)]
    pub transform: TransformArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}

fn parse_rgb(input: &str) -> Result<Rgb, String> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    let [red, green, blue] = parts.as_slice() else {
        return Err(format!("expected R,G,B, got {input:?}"));
    };
    let channel = |part: &str| {
        part.parse::<u8>()
            .map_err(|_| format!("colour channel must be 0-255, got {part:?}"))
    };
    Ok(Rgb::new(channel(*red)?, channel(*green)?, channel(*blue)?))
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
