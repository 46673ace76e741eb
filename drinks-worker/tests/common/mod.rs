//! Fake USB bus shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use drinks_worker::orders::{MemoryOrderStore, Order, OrderStore};
use drinks_worker::printing::{DeviceError, DeviceHandle, DeviceLayer, PrinterConnection};
use drinks_worker::{Worker, WorkerOptions};
use parking_lot::Mutex;

pub const PRINTER: DeviceHandle = DeviceHandle {
    vendor_id: 0x04b8,
    product_id: 0x0e15,
    bus: 1,
    address: 4,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub open: bool,
    pub write: bool,
    pub close: bool,
}

/// Devices on the fake bus and every receipt that reached the "paper"
#[derive(Default)]
pub struct FakeBus {
    attached: Mutex<Vec<DeviceHandle>>,
    faults: Mutex<Faults>,
    jams: Arc<Mutex<Vec<String>>>,
    receipts: Arc<Mutex<Vec<Vec<u8>>>>,
    probes: AtomicUsize,
}

impl FakeBus {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_printer() -> Arc<Self> {
        let bus = Self::empty();
        bus.plug(PRINTER);
        bus
    }

    pub fn plug(&self, device: DeviceHandle) {
        self.attached.lock().push(device);
    }

    pub fn unplug_all(&self) {
        self.attached.lock().clear();
    }

    pub fn set_faults(&self, faults: Faults) {
        *self.faults.lock() = faults;
    }

    /// Fail every write of a receipt mentioning `text`
    pub fn jam_receipts_containing(&self, text: &str) {
        self.jams.lock().push(text.to_string());
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn receipt_count(&self) -> usize {
        self.receipts.lock().len()
    }

    /// Position of the first receipt mentioning `text`
    pub fn receipt_index(&self, text: &str) -> Option<usize> {
        self.receipts
            .lock()
            .iter()
            .position(|r| mentions(r, text))
    }
}

fn mentions(data: &[u8], text: &str) -> bool {
    data.windows(text.len()).any(|w| w == text.as_bytes())
}

struct FakeConnection {
    faults: Faults,
    jams: Arc<Mutex<Vec<String>>>,
    receipts: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl DeviceLayer for FakeBus {
    async fn enumerate(&self) -> Result<Vec<DeviceHandle>, DeviceError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.attached.lock().clone())
    }

    async fn open(&self, device: &DeviceHandle) -> Result<Box<dyn PrinterConnection>, DeviceError> {
        let faults = *self.faults.lock();
        if faults.open || !self.attached.lock().contains(device) {
            return Err(DeviceError::Open {
                device: device.to_string(),
                reason: "no such device".into(),
            });
        }
        Ok(Box::new(FakeConnection {
            faults,
            jams: self.jams.clone(),
            receipts: self.receipts.clone(),
        }))
    }
}

#[async_trait]
impl PrinterConnection for FakeConnection {
    async fn write(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        if self.faults.write || self.jams.lock().iter().any(|t| mentions(data, t)) {
            return Err(DeviceError::Write {
                device: "fake".into(),
                reason: "out of paper".into(),
            });
        }
        self.receipts.lock().push(data.to_vec());
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DeviceError> {
        if self.faults.close {
            return Err(DeviceError::Close {
                device: "fake".into(),
                reason: "endpoint stalled".into(),
            });
        }
        Ok(())
    }
}

pub fn options() -> WorkerOptions {
    WorkerOptions {
        settle_delay: Duration::from_secs(1),
        finalize_backoff: Duration::from_millis(10),
        ..Default::default()
    }
}

pub fn worker(store: &Arc<MemoryOrderStore>, bus: &Arc<FakeBus>) -> Worker {
    let store: Arc<dyn OrderStore> = store.clone();
    let devices: Arc<dyn DeviceLayer> = bus.clone();
    Worker::new(options(), store, devices)
}

pub fn pending(id: &str, drink: &str, client: &str, timestamp: i64) -> Order {
    Order::pending(id, drink, client, timestamp)
}
