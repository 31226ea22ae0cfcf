// jkcoxson
// In-memory USB bus for tests

use std::{cell::RefCell, rc::Rc, time::Duration};

use rusb::Direction;

use crate::usb::{
    Configuration, ControlRequest, Endpoint, Interface, UsbBus, UsbDevice, APPLE_VENDOR_ID,
};

pub fn interface(number: u8, class: u8, sub_class: u8, protocol: u8) -> Interface {
    Interface {
        number,
        alt_setting: 0,
        class,
        sub_class,
        protocol,
        endpoints: Vec::new(),
    }
}

pub fn endpoint(address: u8) -> Endpoint {
    Endpoint {
        address,
        direction: if address & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        },
    }
}

/// usbmux interface with its bulk IN/OUT pair
pub fn usbmux_interface(number: u8) -> Interface {
    Interface {
        endpoints: vec![endpoint(0x04), endpoint(0x85)],
        ..interface(number, 255, 254, 2)
    }
}

pub fn config(value: u8, interfaces: Vec<Interface>) -> Configuration {
    Configuration { value, interfaces }
}

/// Four plain configurations, the last one with usbmux
pub fn initial_configs() -> Vec<Configuration> {
    vec![
        config(1, vec![interface(0, 6, 1, 1)]),
        config(2, vec![interface(0, 6, 1, 1), interface(1, 1, 1, 0)]),
        config(3, vec![interface(0, 6, 1, 1), interface(1, 255, 253, 1)]),
        config(4, vec![interface(0, 6, 1, 1), usbmux_interface(1)]),
    ]
}

pub fn valeria_configs() -> Vec<Configuration> {
    let mut configs = initial_configs();
    configs.push(config(
        5,
        vec![
            interface(0, 6, 1, 1),
            usbmux_interface(1),
            interface(2, 255, 42, 255),
        ],
    ));
    configs
}

#[derive(Default)]
pub struct FakeState {
    pub configurations: Vec<Configuration>,
    pub active_configuration: u8,
    pub response: Vec<u8>,
    pub transfer_error: Option<rusb::Error>,
    pub requests: Vec<(ControlRequest, Duration)>,
    pub detached: Vec<u8>,
}

/// Clones share state, so a test can keep one and inspect what the code
/// under test did with the other.
#[derive(Clone)]
pub struct FakeDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus_number: u8,
    pub address: u8,
    pub serial_number: Option<String>,
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeDevice {
    pub fn new(vendor_id: u16, product_id: u16, serial_number: &str) -> Self {
        Self {
            vendor_id,
            product_id,
            bus_number: 1,
            address: 2,
            serial_number: Some(serial_number.to_string()),
            state: Rc::new(RefCell::new(FakeState {
                configurations: initial_configs(),
                active_configuration: 1,
                ..FakeState::default()
            })),
        }
    }

    pub fn apple(product_id: u16, serial_number: &str) -> Self {
        Self::new(APPLE_VENDOR_ID, product_id, serial_number)
    }

    pub fn with_configurations(self, configurations: Vec<Configuration>) -> Self {
        self.state.borrow_mut().configurations = configurations;
        self
    }

    pub fn without_serial(mut self) -> Self {
        self.serial_number = None;
        self
    }

    pub fn requests(&self) -> Vec<(ControlRequest, Duration)> {
        self.state.borrow().requests.clone()
    }
}

impl UsbDevice for FakeDevice {
    fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    fn product_id(&self) -> u16 {
        self.product_id
    }

    fn bus_number(&self) -> u8 {
        self.bus_number
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn serial_number(&self) -> rusb::Result<String> {
        self.serial_number.clone().ok_or(rusb::Error::Access)
    }

    fn configurations(&self) -> rusb::Result<Vec<Configuration>> {
        Ok(self.state.borrow().configurations.clone())
    }

    fn read_control(&self, request: &ControlRequest, timeout: Duration) -> rusb::Result<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        state.requests.push((*request, timeout));
        if let Some(e) = state.transfer_error {
            return Err(e);
        }
        let mut response = state.response.clone();
        response.truncate(request.length as usize);
        Ok(response)
    }

    fn active_configuration(&self) -> rusb::Result<u8> {
        Ok(self.state.borrow().active_configuration)
    }

    fn switch_configuration(&self, value: u8, interfaces: &[u8]) -> rusb::Result<()> {
        let mut state = self.state.borrow_mut();
        state.detached.extend_from_slice(interfaces);
        state.active_configuration = value;
        Ok(())
    }
}

pub struct FakeBus {
    pub devices: RefCell<Vec<FakeDevice>>,
}

impl FakeBus {
    pub fn new(devices: Vec<FakeDevice>) -> Self {
        Self {
            devices: RefCell::new(devices),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Replaces what the next enumeration returns
    pub fn replug(&self, devices: Vec<FakeDevice>) {
        *self.devices.borrow_mut() = devices;
    }
}

impl UsbBus for FakeBus {
    type Device = FakeDevice;

    fn enumerate(&self) -> rusb::Result<Vec<FakeDevice>> {
        Ok(self.devices.borrow().clone())
    }
}
