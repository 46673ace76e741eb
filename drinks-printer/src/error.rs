//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// libusb reported an error while enumerating or talking to a device
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    /// Access to the device node was denied (udev rules / group membership)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The device behind a handle is no longer attached
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device has no bulk OUT endpoint we can write receipts to
    #[error("No printer endpoint: {0}")]
    NoEndpoint(String),

    /// Fewer bytes were accepted than sent
    #[error("Incomplete write: {written}/{expected} bytes")]
    IncompleteWrite { written: usize, expected: usize },

    /// Hotplug notifications are not available on this platform
    #[error("Hotplug unsupported")]
    HotplugUnsupported,

    /// IO error (hotplug thread start-up)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl PrintError {
    /// Classify a libusb error, lifting access failures into `PermissionDenied`
    pub fn from_usb(context: &str, err: rusb::Error) -> Self {
        match err {
            rusb::Error::Access => PrintError::PermissionDenied(context.to_string()),
            rusb::Error::NoDevice | rusb::Error::NotFound => {
                PrintError::DeviceNotFound(context.to_string())
            }
            other => PrintError::Usb(other),
        }
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
