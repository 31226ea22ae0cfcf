// jkcoxson

use std::time::Duration;

use log::{trace, warn};
use rusb::{ConfigDescriptor, Context, Device, DeviceDescriptor, Direction, Recipient, RequestType, UsbContext};

use crate::mode::Mode;

pub const APPLE_VENDOR_ID: u16 = 0x05ac;

const PID_RANGE_LOW: u16 = 0x1290;
const PID_RANGE_MAX: u16 = 0x12af;
const PID_APPLE_T2_COPROCESSOR: u16 = 0x8600;
const PID_APPLE_SILICON_RESTORE_LOW: u16 = 0x1901;
const PID_APPLE_SILICON_RESTORE_MAX: u16 = 0x1905;

const APPLE_VEND_SPECIFIC_GET_MODE: u8 = 0x45;
const APPLE_VEND_SPECIFIC_SET_MODE: u8 = 0x52;

/// Used when the caller doesn't pass a timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

const STRING_TIMEOUT: Duration = Duration::from_secs(1);

pub fn is_apple_mobile_device(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == APPLE_VENDOR_ID
        && (product_id == PID_APPLE_T2_COPROCESSOR
            || (PID_APPLE_SILICON_RESTORE_LOW..=PID_APPLE_SILICON_RESTORE_MAX).contains(&product_id)
            || (PID_RANGE_LOW..=PID_RANGE_MAX).contains(&product_id))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// bConfigurationValue
    pub value: u8,
    /// Every alternate setting of every interface
    pub interfaces: Vec<Interface>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub number: u8,
    pub alt_setting: u8,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub address: u8,
    pub direction: Direction,
}

impl From<&ConfigDescriptor> for Configuration {
    fn from(config: &ConfigDescriptor) -> Self {
        let mut interfaces = Vec::new();
        for interface in config.interfaces() {
            for descriptor in interface.descriptors() {
                interfaces.push(Interface {
                    number: descriptor.interface_number(),
                    alt_setting: descriptor.setting_number(),
                    class: descriptor.class_code(),
                    sub_class: descriptor.sub_class_code(),
                    protocol: descriptor.protocol_code(),
                    endpoints: descriptor
                        .endpoint_descriptors()
                        .map(|endpoint| Endpoint {
                            address: endpoint.address(),
                            direction: endpoint.direction(),
                        })
                        .collect(),
                });
            }
        }
        Configuration {
            value: config.number(),
            interfaces,
        }
    }
}

/// A single control transfer on the default endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl ControlRequest {
    // The direction is IN for both requests, including set-mode, matching
    // what has been observed working against real devices.
    fn vendor_specific(request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type: rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Device),
            request,
            value,
            index,
            length,
        }
    }

    pub fn get_mode() -> Self {
        Self::vendor_specific(APPLE_VEND_SPECIFIC_GET_MODE, 0, 0, 4)
    }

    pub fn set_mode(mode: Mode) -> Self {
        Self::vendor_specific(APPLE_VEND_SPECIFIC_SET_MODE, 0, mode.value(), 1)
    }
}

/// Source of USB devices to scan
pub trait UsbBus {
    type Device: UsbDevice;

    fn enumerate(&self) -> rusb::Result<Vec<Self::Device>>;
}

/// What the scanner and the mode code need from a device. Descriptors are
/// read from the device on every call.
pub trait UsbDevice {
    fn vendor_id(&self) -> u16;
    fn product_id(&self) -> u16;
    fn bus_number(&self) -> u8;
    fn address(&self) -> u8;
    fn serial_number(&self) -> rusb::Result<String>;
    fn configurations(&self) -> rusb::Result<Vec<Configuration>>;
    /// Runs an IN control transfer and returns the bytes actually received
    fn read_control(&self, request: &ControlRequest, timeout: Duration) -> rusb::Result<Vec<u8>>;
    fn active_configuration(&self) -> rusb::Result<u8>;
    /// Detaches kernel drivers from `interfaces`, then activates `value`
    fn switch_configuration(&self, value: u8, interfaces: &[u8]) -> rusb::Result<()>;
}

/// Keeps only the devices that look like Apple mobile devices
pub fn apple_devices<B: UsbBus>(bus: &B) -> rusb::Result<Vec<B::Device>> {
    Ok(bus
        .enumerate()?
        .into_iter()
        .filter(|device| {
            let keep = is_apple_mobile_device(device.vendor_id(), device.product_id());
            if !keep {
                trace!(
                    "Skipping {:04x}:{:04x} at {}-{}",
                    device.vendor_id(),
                    device.product_id(),
                    device.bus_number(),
                    device.address()
                );
            }
            keep
        })
        .collect())
}

pub struct LibusbDevice<T: UsbContext> {
    device: Device<T>,
    descriptor: DeviceDescriptor,
}

impl UsbBus for Context {
    type Device = LibusbDevice<Context>;

    fn enumerate(&self) -> rusb::Result<Vec<Self::Device>> {
        let mut found = Vec::new();
        for device in self.devices()?.iter() {
            match device.device_descriptor() {
                Ok(descriptor) => found.push(LibusbDevice { device, descriptor }),
                Err(e) => warn!(
                    "Unable to read device descriptor at {}-{}: {:?}",
                    device.bus_number(),
                    device.address(),
                    e
                ),
            }
        }
        Ok(found)
    }
}

impl<T: UsbContext> UsbDevice for LibusbDevice<T> {
    fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id()
    }

    fn product_id(&self) -> u16 {
        self.descriptor.product_id()
    }

    fn bus_number(&self) -> u8 {
        self.device.bus_number()
    }

    fn address(&self) -> u8 {
        self.device.address()
    }

    fn serial_number(&self) -> rusb::Result<String> {
        let handle = self.device.open()?;
        let langs = handle.read_languages(STRING_TIMEOUT)?;
        let lang = *langs.first().ok_or(rusb::Error::NotFound)?;
        let serial_number = handle.read_serial_number_string(lang, &self.descriptor, STRING_TIMEOUT)?;
        Ok(serial_number.trim().replace('\0', ""))
    }

    fn configurations(&self) -> rusb::Result<Vec<Configuration>> {
        let descriptor = self.device.device_descriptor()?;
        (0..descriptor.num_configurations())
            .map(|index| {
                self.device
                    .config_descriptor(index)
                    .map(|config| Configuration::from(&config))
            })
            .collect()
    }

    fn read_control(&self, request: &ControlRequest, timeout: Duration) -> rusb::Result<Vec<u8>> {
        let handle = self.device.open()?;
        let mut buf = vec![0; request.length as usize];
        let len = handle.read_control(
            request.request_type,
            request.request,
            request.value,
            request.index,
            &mut buf,
            timeout,
        )?;
        buf.truncate(len);
        Ok(buf)
    }

    fn active_configuration(&self) -> rusb::Result<u8> {
        self.device.open()?.active_configuration()
    }

    fn switch_configuration(&self, value: u8, interfaces: &[u8]) -> rusb::Result<()> {
        let mut handle = self.device.open()?;
        for &interface in interfaces {
            match handle.kernel_driver_active(interface) {
                Ok(true) => {
                    trace!("Detaching kernel driver from interface {}", interface);
                    handle.detach_kernel_driver(interface)?;
                }
                Ok(false) => {}
                // Platforms without kernel driver support
                Err(rusb::Error::NotSupported) => {}
                Err(e) => return Err(e),
            }
        }
        handle.set_active_configuration(value)
    }
}
