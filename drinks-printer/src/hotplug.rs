//! USB hotplug notifications
//!
//! libusb delivers attach/detach callbacks from inside `handle_events`, so a
//! dedicated thread pumps events and forwards them to a tokio channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use rusb::{Context, Device, UsbContext};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{PrintError, PrintResult};
use crate::usb::DeviceHandle;

/// How long one `handle_events` call may block before the stop flag is checked
const EVENT_POLL: Duration = Duration::from_millis(250);

/// A device appeared on or disappeared from the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugEvent {
    Attached(DeviceHandle),
    Detached(DeviceHandle),
}

impl HotplugEvent {
    pub fn device(&self) -> &DeviceHandle {
        match self {
            HotplugEvent::Attached(d) | HotplugEvent::Detached(d) => d,
        }
    }
}

/// Forwards libusb callbacks into the channel
struct Forwarder {
    tx: mpsc::UnboundedSender<HotplugEvent>,
}

impl rusb::Hotplug<Context> for Forwarder {
    fn device_arrived(&mut self, device: Device<Context>) {
        let event = HotplugEvent::Attached(DeviceHandle::from_device(&device));
        debug!(?event, "USB device arrived");
        let _ = self.tx.send(event);
    }

    fn device_left(&mut self, device: Device<Context>) {
        let event = HotplugEvent::Detached(DeviceHandle::from_device(&device));
        debug!(?event, "USB device left");
        let _ = self.tx.send(event);
    }
}

/// Running hotplug event pump
///
/// Dropping the watcher stops the thread and deregisters the callback.
pub struct HotplugWatcher {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HotplugWatcher {
    /// Register for attach/detach events of every USB device
    ///
    /// Returns [`PrintError::HotplugUnsupported`] when libusb lacks hotplug
    /// support on this platform (e.g. Windows).
    pub fn spawn(tx: mpsc::UnboundedSender<HotplugEvent>) -> PrintResult<Self> {
        if !rusb::has_hotplug() {
            return Err(PrintError::HotplugUnsupported);
        }

        let context = Context::new().map_err(|e| PrintError::from_usb("libusb init", e))?;
        let callback: Box<dyn rusb::Hotplug<Context>> = Box::new(Forwarder { tx });
        let registration = rusb::HotplugBuilder::new()
            .enumerate(false)
            .register(context.clone(), callback)
            .map_err(|e| PrintError::from_usb("hotplug registration", e))?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let thread = std::thread::Builder::new()
            .name("usb-hotplug".into())
            .spawn(move || {
                let _registration = registration;
                while !thread_stop.load(Ordering::Relaxed) {
                    match context.handle_events(Some(EVENT_POLL)) {
                        Ok(()) | Err(rusb::Error::Interrupted) => {}
                        Err(e) => {
                            warn!(error = %e, "libusb event handling failed");
                            std::thread::sleep(EVENT_POLL);
                        }
                    }
                }
                debug!("Hotplug thread exiting");
            })?;

        info!("USB hotplug watcher started");

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    /// Stop the event pump and wait for the thread to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("Hotplug thread panicked");
        }
    }
}

impl Drop for HotplugWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_device() {
        let handle = DeviceHandle {
            vendor_id: 0x0519,
            product_id: 0x0003,
            bus: 3,
            address: 9,
        };
        assert_eq!(HotplugEvent::Attached(handle).device(), &handle);
        assert_eq!(HotplugEvent::Detached(handle).device(), &handle);
    }
}
