// jkcoxson
// Choosing which device a command applies to

use colored::Colorize;
use log::warn;
use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    devices::{DeviceRegistry, IDevice},
    error::{MuxError, Result},
    usb::UsbDevice,
};

/// Resolves the target device. With a serial number it is looked up
/// directly, otherwise a lone device is taken as is and `choose` is asked
/// to pick an index when there are several.
pub fn pick_device<'a, D, F>(
    registry: &'a DeviceRegistry<D>,
    serial_number: Option<&str>,
    choose: F,
) -> Result<&'a IDevice<D>>
where
    D: UsbDevice,
    F: FnOnce(&[&IDevice<D>]) -> Result<usize>,
{
    if let Some(serial_number) = serial_number {
        return registry
            .get(serial_number)
            .ok_or_else(|| MuxError::DeviceNotFound(serial_number.to_string()));
    }

    let devices = registry.sorted();
    match devices.len() {
        0 => Err(MuxError::NoDevices),
        1 => Ok(devices[0]),
        _ => {
            let index = choose(&devices)?;
            devices.get(index).copied().ok_or(MuxError::NoDeviceSelected)
        }
    }
}

pub fn describe<D: UsbDevice>(device: &IDevice<D>) -> String {
    let mode = match device.get_mode() {
        Ok(Some(mode)) => mode.to_string(),
        Ok(None) => "Unknown".to_string(),
        Err(e) => {
            warn!("Unable to read mode of {}: {}", device.serial_number(), e);
            "Unknown".to_string()
        }
    };
    format!("{} ({})", device.serial_number(), mode)
}

/// Numbered prompt on the terminal. Ctrl-C or Ctrl-D aborts.
pub fn prompt<D: UsbDevice>(devices: &[&IDevice<D>]) -> Result<usize> {
    println!("Multiple devices found:");
    for (i, device) in devices.iter().enumerate() {
        println!("  {} {}", format!("[{}]", i + 1).bold(), describe(device));
    }

    let mut editor = DefaultEditor::new().map_err(MuxError::Prompt)?;
    loop {
        match editor.readline(&format!("Select a device [1-{}]: ", devices.len())) {
            Ok(line) => match parse_choice(&line, devices.len()) {
                Some(index) => return Ok(index),
                None => println!("{}", format!("Invalid choice: {:?}", line.trim()).yellow()),
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                return Err(MuxError::NoDeviceSelected)
            }
            Err(e) => return Err(MuxError::Prompt(e)),
        }
    }
}

/// 1-based choice to index
fn parse_choice(line: &str, count: usize) -> Option<usize> {
    match line.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}
