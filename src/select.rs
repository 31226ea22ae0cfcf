// jkcoxson
// Picks the configuration carrying the usbmux interface and makes it active

use log::{info, trace};
use rusb::Direction;

use crate::{
    devices::IDevice,
    error::{MuxError, Result},
    mode::USBMUX_INTERFACE,
    usb::{Configuration, Interface, UsbDevice},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub configuration: u8,
    pub interface: u8,
    pub alt_setting: u8,
    pub endpoint_in: u8,
    pub endpoint_out: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AlreadyActive(Selection),
    Switched(Selection),
}

/// Returns the (IN, OUT) endpoint addresses if the interface has exactly
/// one of each and nothing else
fn endpoint_pair(interface: &Interface) -> Option<(u8, u8)> {
    match interface.endpoints.as_slice() {
        [a, b] => match (a.direction, b.direction) {
            (Direction::In, Direction::Out) => Some((a.address, b.address)),
            (Direction::Out, Direction::In) => Some((b.address, a.address)),
            _ => None,
        },
        _ => None,
    }
}

/// First usbmux interface with a usable endpoint pair, configurations
/// scanned in descriptor order
pub fn find_usbmux_interface(configurations: &[Configuration]) -> Result<Selection> {
    for config in configurations {
        for interface in &config.interfaces {
            if !USBMUX_INTERFACE.matches(interface) {
                continue;
            }
            let Some((endpoint_in, endpoint_out)) = endpoint_pair(interface) else {
                trace!(
                    "usbmux interface {} in configuration {} has {} endpoints, skipping",
                    interface.number,
                    config.value,
                    interface.endpoints.len()
                );
                continue;
            };
            return Ok(Selection {
                configuration: config.value,
                interface: interface.number,
                alt_setting: interface.alt_setting,
                endpoint_in,
                endpoint_out,
            });
        }
    }
    Err(MuxError::NoSuitableInterface)
}

pub fn select_usbmux_configuration<D: UsbDevice>(device: &IDevice<D>) -> Result<Outcome> {
    let configurations = device.device().configurations()?;
    let selection = find_usbmux_interface(&configurations)?;

    let active = device.device().active_configuration()?;
    if active == selection.configuration {
        info!(
            "Configuration {} is already active on {}",
            active,
            device.serial_number()
        );
        return Ok(Outcome::AlreadyActive(selection));
    }

    let mut interfaces: Vec<u8> = configurations
        .iter()
        .filter(|config| config.value == selection.configuration)
        .flat_map(|config| config.interfaces.iter().map(|i| i.number))
        .collect();
    interfaces.sort_unstable();
    interfaces.dedup();

    info!(
        "Switching {} from configuration {} to {}",
        device.serial_number(),
        active,
        selection.configuration
    );
    device
        .device()
        .switch_configuration(selection.configuration, &interfaces)?;
    Ok(Outcome::Switched(selection))
}
