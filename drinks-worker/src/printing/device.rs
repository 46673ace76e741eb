//! Device layer seam
//!
//! Everything the printing core needs from the USB stack: list candidate
//! printers and run one open/write/close session against a handle.

use async_trait::async_trait;
use thiserror::Error;

pub use drinks_printer::{DeviceHandle, HotplugEvent};

#[derive(Debug, Error)]
pub enum DeviceError {
    /// The OS refused access to the bus or device (udev rules, group membership)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    #[error("Failed to open printer {device}: {reason}")]
    Open { device: String, reason: String },

    #[error("Failed to write to printer {device}: {reason}")]
    Write { device: String, reason: String },

    #[error("Failed to close printer {device}: {reason}")]
    Close { device: String, reason: String },
}

impl DeviceError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, DeviceError::PermissionDenied(_))
    }
}

/// Access to attached printers
#[async_trait]
pub trait DeviceLayer: Send + Sync {
    /// Candidate printers in enumeration order
    async fn enumerate(&self) -> Result<Vec<DeviceHandle>, DeviceError>;

    /// Open a fresh session against one printer
    async fn open(&self, device: &DeviceHandle) -> Result<Box<dyn PrinterConnection>, DeviceError>;
}

/// One open printer session, consumed by [`PrinterConnection::close`]
#[async_trait]
pub trait PrinterConnection: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), DeviceError>;

    async fn close(self: Box<Self>) -> Result<(), DeviceError>;
}
