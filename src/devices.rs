// jkcoxson

use std::{collections::HashMap, time::Duration};

use log::{debug, info, trace, warn};

use crate::{
    error::{MuxError, Result},
    mode::{self, Mode},
    usb::{self, ControlRequest, UsbBus, UsbDevice, DEFAULT_TIMEOUT},
};

/// A connected Apple device
pub struct IDevice<D> {
    device: D,
    serial_number: String,
}

impl<D: UsbDevice> IDevice<D> {
    pub fn new(device: D, serial_number: String) -> Self {
        Self {
            device,
            serial_number,
        }
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Reads the descriptors again and classifies them, nothing is cached
    pub fn get_mode(&self) -> Result<Option<Mode>> {
        let configurations = self.device.configurations()?;
        trace!(
            "{} exposes {} configurations",
            self.serial_number,
            configurations.len()
        );
        Ok(mode::classify(&configurations))
    }

    /// Asks the device to switch modes. Whether it actually did is only
    /// visible through a later `get_mode`.
    pub fn request_mode_change(&self, mode: Mode, timeout: Option<Duration>) -> Result<Vec<u8>> {
        info!("Requesting mode {} on {}", mode, self.serial_number);
        self.submit(&ControlRequest::set_mode(mode), timeout)
    }

    /// Raw response of the get-mode request
    pub fn read_mode(&self, timeout: Option<Duration>) -> Result<Vec<u8>> {
        self.submit(&ControlRequest::get_mode(), timeout)
    }

    fn submit(&self, request: &ControlRequest, timeout: Option<Duration>) -> Result<Vec<u8>> {
        debug!("Sending {:?} to {}", request, self.serial_number);
        let response = self
            .device
            .read_control(request, timeout.unwrap_or(DEFAULT_TIMEOUT))
            .map_err(MuxError::DeviceTransfer)?;
        debug!("{} responded with {:02x?}", self.serial_number, response);
        Ok(response)
    }
}

/// Apple devices found on the bus, keyed by serial number
pub struct DeviceRegistry<D> {
    pub devices: HashMap<String, IDevice<D>>,
}

impl<D: UsbDevice> DeviceRegistry<D> {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
        }
    }

    pub fn scan<B: UsbBus<Device = D>>(bus: &B) -> Result<Self> {
        let mut registry = Self::new();
        registry.refresh(bus)?;
        Ok(registry)
    }

    /// Rescans the bus. Known serials get a fresh handle and new ones are
    /// added; devices that went away are kept.
    pub fn refresh<B: UsbBus<Device = D>>(&mut self, bus: &B) -> Result<()> {
        for device in usb::apple_devices(bus)? {
            info!(
                "Found new device with v/p {:04x}:{:04x} at {}-{}",
                device.vendor_id(),
                device.product_id(),
                device.bus_number(),
                device.address()
            );
            let serial_number = match device.serial_number() {
                Ok(s) => s,
                Err(e) => {
                    warn!(
                        "Unable to read serial number at {}-{}, skipping: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    continue;
                }
            };
            self.devices
                .insert(serial_number.clone(), IDevice::new(device, serial_number));
        }
        Ok(())
    }

    pub fn get(&self, serial_number: &str) -> Option<&IDevice<D>> {
        self.devices.get(serial_number)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Devices ordered by serial number
    pub fn sorted(&self) -> Vec<&IDevice<D>> {
        let mut devices: Vec<_> = self.devices.values().collect();
        devices.sort_by(|a, b| a.serial_number.cmp(&b.serial_number));
        devices
    }
}

impl<D: UsbDevice> Default for DeviceRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}
