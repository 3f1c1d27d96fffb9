// Serial parameters, polling timing, and command-line configuration
use std::time::Duration;

use clap::{ArgAction, Parser};

// Serial link to the gimbal bus (not configurable)
pub const BAUD_RATE: u32 = 57_600;
pub const INTER_CHAR_TIMEOUT: Duration = Duration::from_millis(100);
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(50);

// Moving-flag poll period used while waiting for a move to finish
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_PROFILE_ACCELERATION: u32 = 50;
pub const DEFAULT_PROFILE_VELOCITY: u32 = 50;

/// Command-line flags
#[derive(Debug, Clone, Parser)]
#[command(name = "gimbal-control", about = "Home and sweep a three-axis servo gimbal")]
pub struct Cli {
    /// The serial port path
    #[arg(long, default_value = DEFAULT_PORT)]
    pub port: String,

    /// The profile acceleration to set
    #[arg(long, default_value_t = DEFAULT_PROFILE_ACCELERATION)]
    pub acceleration: u32,

    /// The profile velocity to set
    #[arg(long, default_value_t = DEFAULT_PROFILE_VELOCITY)]
    pub velocity: u32,

    /// Show serial traffic
    #[arg(long, default_value_t = false, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub debug: bool,

    /// Move to unload the device
    #[arg(long, default_value_t = false, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub unload: bool,

    /// Home the device
    #[arg(long, default_value_t = true, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub home: bool,

    /// Run the sweep profile
    #[arg(long, default_value_t = false, num_args = 0..=1, default_missing_value = "true", action = ArgAction::Set)]
    pub run: bool,

    /// Give up on a move that has not stopped after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub wait_timeout_ms: Option<u64>,
}

/// Run configuration, read once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: String,
    pub acceleration: u32,
    pub velocity: u32,
    pub debug: bool,
    pub unload: bool,
    pub home: bool,
    pub run: bool,
    /// `None` waits for every move indefinitely
    pub wait_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            acceleration: DEFAULT_PROFILE_ACCELERATION,
            velocity: DEFAULT_PROFILE_VELOCITY,
            debug: false,
            unload: false,
            home: true,
            run: false,
            wait_timeout: None,
        }
    }
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            acceleration: cli.acceleration,
            velocity: cli.velocity,
            debug: cli.debug,
            unload: cli.unload,
            home: cli.home,
            run: cli.run,
            wait_timeout: cli.wait_timeout_ms.map(Duration::from_millis),
        }
    }
}
