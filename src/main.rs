// jkcoxson

use clap::Parser;
use colored::Colorize;
use log::{debug, error, info};

use crate::{
    config::{Cli, Command},
    devices::DeviceRegistry,
    error::Result,
    select::Outcome,
    usb::UsbDevice,
};

mod config;
mod devices;
mod error;
mod mode;
mod picker;
mod select;
#[cfg(test)]
mod test_utils;
mod usb;

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config::log_filter(cli.verbose)),
    )
    .init();

    if let Err(e) = run(cli) {
        debug!("{:?}", e);
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let context = rusb::Context::new()?;
    let registry = DeviceRegistry::scan(&context)?;
    info!("Scan finished, {} device(s) found", registry.len());

    match cli.command {
        Command::List => list(&registry),
        Command::GetMode { target } => {
            let device = picker::pick_device(&registry, target.serial.as_deref(), picker::prompt)?;
            let response = device.read_mode(target.timeout)?;
            println!("{}: {}", device.serial_number(), hex(&response));
        }
        Command::SetMode { mode, target } => {
            let device = picker::pick_device(&registry, target.serial.as_deref(), picker::prompt)?;
            let response = device.request_mode_change(mode, target.timeout)?;
            println!(
                "Requested {} on {} (response: {})",
                mode.to_string().green(),
                device.serial_number(),
                hex(&response)
            );
        }
        Command::SelectConfig { serial } => {
            let device = picker::pick_device(&registry, serial.as_deref(), picker::prompt)?;
            match select::select_usbmux_configuration(device)? {
                Outcome::AlreadyActive(s) => println!(
                    "Configuration {} is already active on {}",
                    s.configuration,
                    device.serial_number()
                ),
                Outcome::Switched(s) => println!(
                    "Activated configuration {} on {} (usbmux interface {} alt {}, endpoints {:#04x}/{:#04x})",
                    s.configuration.to_string().green(),
                    device.serial_number(),
                    s.interface,
                    s.alt_setting,
                    s.endpoint_in,
                    s.endpoint_out
                ),
            }
        }
    }
    Ok(())
}

fn list<D: UsbDevice>(registry: &DeviceRegistry<D>) {
    if registry.is_empty() {
        println!("No devices found");
        return;
    }

    println!("{:<28} {:<10} {:<8} {}", "Serial", "v/p", "Location", "Mode");
    for device in registry.sorted() {
        let usb = device.device();
        let mode = match device.get_mode() {
            Ok(Some(mode)) => mode.to_string().green(),
            Ok(None) => "Unknown".yellow(),
            Err(e) => {
                error!("Unable to read mode of {}: {}", device.serial_number(), e);
                "Unknown".red()
            }
        };
        println!(
            "{:<28} {:<10} {:<8} {}",
            device.serial_number(),
            format!("{:04x}:{:04x}", usb.vendor_id(), usb.product_id()),
            format!("{}-{}", usb.bus_number(), usb.address()),
            mode
        );
    }
}

fn hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
