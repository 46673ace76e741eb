//! # drinks-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building
//! - Code page conversion (Windows-1252, GBK)
//! - USB printer enumeration and per-job sessions (libusb)
//! - USB hotplug notifications
//!
//! WHAT to print (the drink receipt layout) and WHEN (order reconciliation)
//! live in `drinks-worker`.
//!
//! ## Example
//!
//! ```ignore
//! use std::time::Duration;
//! use drinks_printer::{EscPosBuilder, UsbPrinter, list_printers};
//!
//! let mut builder = EscPosBuilder::new(48);
//! builder.center();
//! builder.double_size();
//! builder.line("Mojito");
//! builder.reset_size();
//! builder.cut_feed(4);
//!
//! if let Some(device) = list_printers(&[])?.first() {
//!     let mut printer = UsbPrinter::open(device, Duration::from_secs(5))?;
//!     printer.write(&builder.build())?;
//!     printer.close()?;
//! }
//! ```

mod encoding;
mod error;
mod escpos;
mod hotplug;
mod usb;

// Re-exports
pub use encoding::{CodePage, encode_for_printer, truncate_width};
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use hotplug::{HotplugEvent, HotplugWatcher};
pub use usb::{DeviceHandle, PRINTER_VENDOR_IDS, UsbPrinter, list_printers};
