// Jackson Coxson

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::mode::Mode;

pub const ENV_DEVICE_MODE: &str = "USBMUXD_DEFAULT_DEVICE_MODE";

#[derive(Parser, Debug)]
#[command(name = "muxmode", version, about = "Switch the USB mode of connected Apple devices")]
#[command(after_help = "Set RUST_LOG to info, debug, warn, error, or trace to filter logs.")]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List connected Apple devices and their USB mode
    List,
    /// Send the vendor get-mode request and print the raw response
    GetMode {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Ask a device to switch to another USB mode
    SetMode {
        /// INITIAL, VALERIA or CDC_NCM
        #[arg(env = ENV_DEVICE_MODE, value_parser = parse_mode)]
        mode: Mode,

        #[command(flatten)]
        target: TargetArgs,
    },
    /// Activate the configuration carrying the usbmux interface
    SelectConfig {
        /// Serial number of the device, prompts when several are connected
        #[arg(long)]
        serial: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Serial number of the device, prompts when several are connected
    #[arg(long)]
    pub serial: Option<String>,

    /// Control transfer timeout in milliseconds [default: 1000]
    #[arg(long, value_name = "MS", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    Mode::create_from_name(s).map_err(|e| e.to_string())
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    s.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| format!("timeout isn't a number of milliseconds: {:?}", s))
}

/// env_logger filter for the given number of -v flags
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
