// jkcoxson

use std::{fmt, str::FromStr};

use crate::{
    error::{MuxError, Result},
    usb::{Configuration, Interface},
};

/// On top of configurations, Apple devices expose multiple "modes":
/// - `Initial`: the baseline set of at most 4 configurations
/// - `Valeria`: a 5th configuration carrying the H.265 video capture interface
///   (what QuickTime screen recording switches to)
/// - `CdcNcm`: a 5th configuration carrying a CDC-NCM ethernet interface
///   (what internet sharing switches to)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Initial = 1,
    Valeria = 2,
    CdcNcm = 3,
}

const MODE_NAMES: [(&str, Mode); 3] = [
    ("INITIAL", Mode::Initial),
    ("VALERIA", Mode::Valeria),
    ("CDC_NCM", Mode::CdcNcm),
];

impl Mode {
    pub fn create_from_name(name: &str) -> Result<Self> {
        MODE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, mode)| *mode)
            .ok_or_else(|| MuxError::InvalidModeName(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Initial => "INITIAL",
            Mode::Valeria => "VALERIA",
            Mode::CdcNcm => "CDC_NCM",
        }
    }

    /// Value sent as wIndex of the set-mode request
    pub fn value(self) -> u16 {
        self as u16
    }
}

impl FromStr for Mode {
    type Err = MuxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::create_from_name(s)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Class triple identifying an interface. A `None` protocol matches any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceSignature {
    pub class: u8,
    pub sub_class: u8,
    pub protocol: Option<u8>,
}

impl InterfaceSignature {
    pub fn matches(&self, interface: &Interface) -> bool {
        interface.class == self.class
            && interface.sub_class == self.sub_class
            && self.protocol.map_or(true, |p| interface.protocol == p)
    }
}

pub const USBMUX_INTERFACE: InterfaceSignature = InterfaceSignature {
    class: 255,
    sub_class: 254,
    protocol: Some(2),
};

pub const VALERIA_INTERFACE: InterfaceSignature = InterfaceSignature {
    class: 255,
    sub_class: 42,
    protocol: Some(255),
};

// Communication class, CDC NCM subclass (linux include/uapi/linux/usb/cdc.h)
pub const CDC_NCM_INTERFACE: InterfaceSignature = InterfaceSignature {
    class: 2,
    sub_class: 0x0d,
    protocol: None,
};

const INITIAL_MAX_CONFIGURATIONS: usize = 4;
const EXTENDED_CONFIGURATIONS: usize = 5;

/// Works out the mode from a full descriptor snapshot. `None` means the
/// device has the extra configuration but it doesn't look like one we know.
pub fn classify(configurations: &[Configuration]) -> Option<Mode> {
    if configurations.len() <= INITIAL_MAX_CONFIGURATIONS {
        return Some(Mode::Initial);
    }
    if configurations.len() != EXTENDED_CONFIGURATIONS {
        return None;
    }

    let config = &configurations[EXTENDED_CONFIGURATIONS - 1];
    let has = |signature: &InterfaceSignature| config.interfaces.iter().any(|i| signature.matches(i));

    // usbmux has to be there alongside the companion interface
    let has_usbmux = has(&USBMUX_INTERFACE);
    if has(&VALERIA_INTERFACE) && has_usbmux {
        return Some(Mode::Valeria);
    }
    if has(&CDC_NCM_INTERFACE) && has_usbmux {
        return Some(Mode::CdcNcm);
    }
    None
}
