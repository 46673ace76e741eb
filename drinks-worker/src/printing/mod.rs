//! Printer availability and print jobs
//!
//! - [`DeviceLayer`] - USB seam (enumerate, open/write/close)
//! - [`Discovery`] - stateless "first printer" probe
//! - [`PrinterSession`] - the cached current printer
//! - [`ReceiptRenderer`] - drink receipt layout
//! - [`PrintJobExecutor`] - one receipt per call, serialized by a job lock

pub mod device;
pub mod discovery;
pub mod executor;
pub mod renderer;
pub mod session;
pub mod usb;

pub use device::{DeviceError, DeviceHandle, DeviceLayer, HotplugEvent, PrinterConnection};
pub use discovery::Discovery;
pub use executor::{PrintJobError, PrintJobExecutor, PrintJobResult};
pub use renderer::ReceiptRenderer;
pub use session::PrinterSession;
pub use usb::UsbDeviceLayer;
