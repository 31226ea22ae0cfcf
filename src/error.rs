// jkcoxson

use rustyline::error::ReadlineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MuxError>;

#[derive(Debug, Error)]
pub enum MuxError {
    /// The interactive device prompt was aborted
    #[error("no device selected")]
    NoDeviceSelected,

    #[error("invalid mode name: {0:?} (expected INITIAL, VALERIA or CDC_NCM)")]
    InvalidModeName(String),

    /// No usbmux interface with a bulk IN/OUT pair in any configuration
    #[error("no suitable usbmux interface found")]
    NoSuitableInterface,

    #[error("control transfer failed: {0}")]
    DeviceTransfer(#[source] rusb::Error),

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("no device with serial number {0:?}")]
    DeviceNotFound(String),

    #[error("no Apple devices found")]
    NoDevices,

    #[error("prompt failed: {0}")]
    Prompt(#[source] ReadlineError),
}
