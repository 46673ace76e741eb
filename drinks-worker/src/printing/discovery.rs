//! Printer discovery
//!
//! A stateless probe: enumerate candidates and take the first one. Failures
//! never reach the caller; they are logged and reported as "no printer".

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::device::{DeviceError, DeviceHandle, DeviceLayer};

#[derive(Clone)]
pub struct Discovery {
    devices: Arc<dyn DeviceLayer>,
}

impl Discovery {
    pub fn new(devices: Arc<dyn DeviceLayer>) -> Self {
        Self { devices }
    }

    /// First candidate printer in enumeration order, if any
    pub async fn discover(&self) -> Option<DeviceHandle> {
        match self.devices.enumerate().await {
            Ok(candidates) => {
                debug!(count = candidates.len(), "USB printer candidates");
                let first = candidates.into_iter().next();
                match &first {
                    Some(device) => info!(device = %device, "Printer discovered"),
                    None => info!("No USB printer found"),
                }
                first
            }
            Err(e @ DeviceError::PermissionDenied(_)) => {
                warn!(
                    error = %e,
                    "Cannot access USB devices; add a udev rule for the printer or run the worker as a user in the lp/plugdev group"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "USB enumeration failed; check the libusb installation and printer driver");
                None
            }
        }
    }
}
