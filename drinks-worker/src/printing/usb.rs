//! libusb-backed [`DeviceLayer`]
//!
//! libusb calls block, so every call runs on tokio's blocking pool.

use std::time::Duration;

use async_trait::async_trait;
use drinks_printer::{PrintError, UsbPrinter, list_printers};

use super::device::{DeviceError, DeviceHandle, DeviceLayer, PrinterConnection};

pub struct UsbDeviceLayer {
    extra_vendor_ids: Vec<u16>,
    write_timeout: Duration,
}

impl UsbDeviceLayer {
    pub fn new(extra_vendor_ids: Vec<u16>, write_timeout: Duration) -> Self {
        Self {
            extra_vendor_ids,
            write_timeout,
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> String {
    format!("blocking task failed: {}", e)
}

#[async_trait]
impl DeviceLayer for UsbDeviceLayer {
    async fn enumerate(&self) -> Result<Vec<DeviceHandle>, DeviceError> {
        let extra = self.extra_vendor_ids.clone();
        tokio::task::spawn_blocking(move || list_printers(&extra))
            .await
            .map_err(|e| DeviceError::Enumeration(join_error(e)))?
            .map_err(|e| match e {
                PrintError::PermissionDenied(ctx) => DeviceError::PermissionDenied(ctx),
                other => DeviceError::Enumeration(other.to_string()),
            })
    }

    async fn open(&self, device: &DeviceHandle) -> Result<Box<dyn PrinterConnection>, DeviceError> {
        let handle = *device;
        let timeout = self.write_timeout;
        let printer = tokio::task::spawn_blocking(move || UsbPrinter::open(&handle, timeout))
            .await
            .map_err(|e| DeviceError::Open {
                device: handle.to_string(),
                reason: join_error(e),
            })?
            .map_err(|e| match e {
                PrintError::PermissionDenied(ctx) => DeviceError::PermissionDenied(ctx),
                other => DeviceError::Open {
                    device: handle.to_string(),
                    reason: other.to_string(),
                },
            })?;

        Ok(Box::new(UsbConnection {
            device: handle,
            printer: Some(printer),
        }))
    }
}

/// The session is moved onto the blocking pool for each call and back again
struct UsbConnection {
    device: DeviceHandle,
    printer: Option<UsbPrinter>,
}

impl UsbConnection {
    fn take(&mut self) -> Result<UsbPrinter, String> {
        self.printer
            .take()
            .ok_or_else(|| "session lost after a failed blocking call".to_string())
    }
}

#[async_trait]
impl PrinterConnection for UsbConnection {
    async fn write(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        let device = self.device.to_string();
        let mut printer = self.take().map_err(|reason| DeviceError::Write {
            device: device.clone(),
            reason,
        })?;

        let data = data.to_vec();
        let (printer, result) = tokio::task::spawn_blocking(move || {
            let result = printer.write(&data);
            (printer, result)
        })
        .await
        .map_err(|e| DeviceError::Write {
            device: device.clone(),
            reason: join_error(e),
        })?;

        self.printer = Some(printer);
        result.map_err(|e| DeviceError::Write {
            device,
            reason: e.to_string(),
        })
    }

    async fn close(mut self: Box<Self>) -> Result<(), DeviceError> {
        let device = self.device.to_string();
        let printer = self.take().map_err(|reason| DeviceError::Close {
            device: device.clone(),
            reason,
        })?;

        tokio::task::spawn_blocking(move || printer.close())
            .await
            .map_err(|e| DeviceError::Close {
                device: device.clone(),
                reason: join_error(e),
            })?
            .map_err(|e| DeviceError::Close {
                device,
                reason: e.to_string(),
            })
    }
}
