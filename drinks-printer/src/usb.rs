//! USB printer transport
//!
//! Enumeration of attached thermal printers and a blocking, per-job
//! session ([`UsbPrinter`]) that claims the printer interface, bulk-writes
//! ESC/POS data and releases the interface again.
//!
//! libusb calls block; async callers should run them on a blocking thread.

use std::fmt;
use std::time::Duration;

use rusb::{Context, Device, Direction, TransferType, UsbContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{PrintError, PrintResult};

/// Known thermal printer vendor IDs
pub const PRINTER_VENDOR_IDS: &[(u16, &str)] = &[
    (0x04b8, "Epson"),
    (0x0519, "Star Micronics"),
    (0x04f9, "Brother"),
    (0x1d90, "Citizen"),
    (0x1504, "Bixolon"),
    (0x0483, "Xprinter"),
    (0x0416, "Zjiang"),
    (0x0fe6, "ICS Advent"),
    (0x154f, "Wincor Nixdorf"),
];

/// USB interface class code for printers
const USB_CLASS_PRINTER: u8 = 0x07;

/// Identifying data for an attached USB device
///
/// Not a connection: it only locates the device so a session can be opened
/// later. Bus address changes when the device is re-plugged, so a handle can
/// go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceHandle {
    pub vendor_id: u16,
    pub product_id: u16,
    pub bus: u8,
    pub address: u8,
}

impl DeviceHandle {
    pub(crate) fn from_device<T: UsbContext>(device: &Device<T>) -> Self {
        let (vendor_id, product_id) = device
            .device_descriptor()
            .map(|d| (d.vendor_id(), d.product_id()))
            .unwrap_or((0, 0));
        Self {
            vendor_id,
            product_id,
            bus: device.bus_number(),
            address: device.address(),
        }
    }

    /// Vendor name if this is a known thermal printer vendor
    pub fn vendor_name(&self) -> Option<&'static str> {
        PRINTER_VENDOR_IDS
            .iter()
            .find(|(vid, _)| *vid == self.vendor_id)
            .map(|(_, name)| *name)
    }

    fn matches<T: UsbContext>(&self, device: &Device<T>) -> bool {
        device.bus_number() == self.bus
            && device.address() == self.address
            && device
                .device_descriptor()
                .map(|d| d.vendor_id() == self.vendor_id && d.product_id() == self.product_id)
                .unwrap_or(false)
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x}@{:03}/{:03}",
            self.vendor_id, self.product_id, self.bus, self.address
        )
    }
}

/// Location of the bulk OUT endpoint receipts are written to
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    interface: u8,
    setting: u8,
    address: u8,
}

/// Find a bulk OUT endpoint, preferring one on a printer-class interface
fn find_out_endpoint<T: UsbContext>(device: &Device<T>) -> Option<Endpoint> {
    let config = device.active_config_descriptor().ok()?;
    let mut fallback = None;

    for interface in config.interfaces() {
        for desc in interface.descriptors() {
            for ep in desc.endpoint_descriptors() {
                if ep.direction() != Direction::Out || ep.transfer_type() != TransferType::Bulk {
                    continue;
                }
                let endpoint = Endpoint {
                    interface: desc.interface_number(),
                    setting: desc.setting_number(),
                    address: ep.address(),
                };
                if desc.class_code() == USB_CLASS_PRINTER {
                    return Some(endpoint);
                }
                fallback.get_or_insert(endpoint);
            }
        }
    }

    fallback
}

/// Whether any interface of the active configuration is printer class
fn has_printer_interface<T: UsbContext>(device: &Device<T>) -> bool {
    device
        .active_config_descriptor()
        .map(|config| {
            config.interfaces().any(|interface| {
                interface
                    .descriptors()
                    .any(|d| d.class_code() == USB_CLASS_PRINTER)
            })
        })
        .unwrap_or(false)
}

/// Enumerate attached printers in the order libusb reports them
///
/// A device qualifies when its vendor id is a known thermal printer vendor,
/// is listed in `extra_vendor_ids`, or when it exposes a printer-class
/// interface.
#[instrument]
pub fn list_printers(extra_vendor_ids: &[u16]) -> PrintResult<Vec<DeviceHandle>> {
    let context = Context::new().map_err(|e| PrintError::from_usb("libusb init", e))?;
    let devices = context
        .devices()
        .map_err(|e| PrintError::from_usb("device enumeration", e))?;

    let mut found = Vec::new();
    for device in devices.iter() {
        let Ok(desc) = device.device_descriptor() else {
            continue;
        };
        let vid = desc.vendor_id();
        let known_vendor =
            PRINTER_VENDOR_IDS.iter().any(|(v, _)| *v == vid) || extra_vendor_ids.contains(&vid);

        if known_vendor || has_printer_interface(&device) {
            let handle = DeviceHandle::from_device(&device);
            debug!(device = %handle, vendor = ?handle.vendor_name(), "Printer candidate");
            found.push(handle);
        }
    }

    Ok(found)
}

/// An open session against one USB printer
///
/// Created per print job and consumed by [`UsbPrinter::close`].
pub struct UsbPrinter {
    handle: rusb::DeviceHandle<Context>,
    endpoint: Endpoint,
    timeout: Duration,
    device: DeviceHandle,
}

impl UsbPrinter {
    /// Locate the device behind `device` and claim its printer interface
    #[instrument(fields(device = %device))]
    pub fn open(device: &DeviceHandle, timeout: Duration) -> PrintResult<Self> {
        let context = Context::new().map_err(|e| PrintError::from_usb("libusb init", e))?;
        let devices = context
            .devices()
            .map_err(|e| PrintError::from_usb("device enumeration", e))?;

        let usb_device = devices
            .iter()
            .find(|d| device.matches(d))
            .ok_or_else(|| PrintError::DeviceNotFound(device.to_string()))?;

        let endpoint = find_out_endpoint(&usb_device)
            .ok_or_else(|| PrintError::NoEndpoint(device.to_string()))?;

        let handle = usb_device
            .open()
            .map_err(|e| PrintError::from_usb(&device.to_string(), e))?;

        // Linux usblp binds printers; other platforms return NotSupported
        if let Err(e) = handle.set_auto_detach_kernel_driver(true) {
            debug!(error = %e, "Kernel driver auto-detach unavailable");
        }

        handle
            .claim_interface(endpoint.interface)
            .map_err(|e| PrintError::from_usb(&device.to_string(), e))?;

        if endpoint.setting != 0 {
            handle
                .set_alternate_setting(endpoint.interface, endpoint.setting)
                .map_err(|e| PrintError::from_usb(&device.to_string(), e))?;
        }

        info!(
            interface = endpoint.interface,
            endpoint = endpoint.address,
            "Printer session opened"
        );

        Ok(Self {
            handle,
            endpoint,
            timeout,
            device: *device,
        })
    }

    /// The device this session was opened against
    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Bulk-write raw ESC/POS data
    #[instrument(skip(self, data), fields(device = %self.device, data_len = data.len()))]
    pub fn write(&mut self, data: &[u8]) -> PrintResult<()> {
        let mut offset = 0;
        while offset < data.len() {
            let n = self
                .handle
                .write_bulk(self.endpoint.address, &data[offset..], self.timeout)
                .map_err(|e| PrintError::from_usb(&self.device.to_string(), e))?;
            if n == 0 {
                return Err(PrintError::IncompleteWrite {
                    written: offset,
                    expected: data.len(),
                });
            }
            offset += n;
        }

        debug!("Wrote {} bytes", offset);
        Ok(())
    }

    /// Release the interface and drop the libusb handle
    pub fn close(self) -> PrintResult<()> {
        let result = self
            .handle
            .release_interface(self.endpoint.interface)
            .map_err(|e| PrintError::from_usb(&self.device.to_string(), e));
        debug!(device = %self.device, "Printer session closed");
        result
    }
}
