//! Printer session manager
//!
//! Owns "the current printer": a memoized discovery result that is refreshed
//! at startup and after every attach. Detach events do not clear it; the next
//! failed job or attach re-probes instead.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::device::DeviceHandle;
use super::discovery::Discovery;

#[derive(Debug, Default)]
struct SessionState {
    handle: Option<DeviceHandle>,
    /// Discovery ran at least once
    initialized: bool,
}

pub struct PrinterSession {
    discovery: Discovery,
    settle_delay: Duration,
    state: Mutex<SessionState>,
}

impl PrinterSession {
    pub fn new(discovery: Discovery, settle_delay: Duration) -> Self {
        Self {
            discovery,
            settle_delay,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// The cached handle, re-running discovery when absent or `force`d
    ///
    /// A forced probe replaces the cache even when it finds nothing.
    pub async fn ensure_printer(&self, force: bool) -> Option<DeviceHandle> {
        let mut state = self.state.lock().await;
        if !force && let Some(handle) = state.handle {
            return Some(handle);
        }

        let found = self.discovery.discover().await;
        if state.handle != found {
            info!(
                previous = ?state.handle.map(|h| h.to_string()),
                current = ?found.map(|h| h.to_string()),
                "Printer changed"
            );
        }
        state.handle = found;
        state.initialized = true;
        found
    }

    /// Snapshot of the cached handle
    pub async fn current(&self) -> Option<DeviceHandle> {
        self.state.lock().await.handle
    }

    pub async fn is_available(&self) -> bool {
        self.state.lock().await.handle.is_some()
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.initialized
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Wait for the device to settle, then re-probe
    ///
    /// Cancel-safe: dropping the future before the delay elapses leaves the
    /// cache untouched.
    pub async fn on_attach(&self, device: &DeviceHandle) -> Option<DeviceHandle> {
        debug!(device = %device, delay_ms = self.settle_delay.as_millis() as u64, "USB attach, settling");
        tokio::time::sleep(self.settle_delay).await;
        self.ensure_printer(true).await
    }

    pub fn on_detach(&self, device: &DeviceHandle) {
        info!(device = %device, "USB device detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::device::{DeviceError, DeviceLayer, PrinterConnection};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports whatever `attached` holds, counting probes
    #[derive(Default)]
    struct Bus {
        attached: parking_lot::Mutex<Vec<DeviceHandle>>,
        probes: AtomicUsize,
    }

    #[async_trait]
    impl DeviceLayer for Bus {
        async fn enumerate(&self) -> Result<Vec<DeviceHandle>, DeviceError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            Ok(self.attached.lock().clone())
        }

        async fn open(
            &self,
            device: &DeviceHandle,
        ) -> Result<Box<dyn PrinterConnection>, DeviceError> {
            Err(DeviceError::Open {
                device: device.to_string(),
                reason: "not supported".into(),
            })
        }
    }

    const PRINTER: DeviceHandle = DeviceHandle {
        vendor_id: 0x04b8,
        product_id: 0x0202,
        bus: 1,
        address: 5,
    };

    fn session(bus: Arc<Bus>) -> PrinterSession {
        PrinterSession::new(Discovery::new(bus), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_cached_handle_is_reused() {
        let bus = Arc::new(Bus::default());
        bus.attached.lock().push(PRINTER);
        let session = session(bus.clone());

        assert!(!session.is_initialized().await);
        assert_eq!(session.ensure_printer(false).await, Some(PRINTER));
        assert_eq!(session.ensure_printer(false).await, Some(PRINTER));
        assert_eq!(bus.probes.load(Ordering::SeqCst), 1);
        assert!(session.is_initialized().await);
    }

    #[tokio::test]
    async fn test_forced_probe_clears_missing_printer() {
        let bus = Arc::new(Bus::default());
        bus.attached.lock().push(PRINTER);
        let session = session(bus.clone());
        session.ensure_printer(false).await;

        bus.attached.lock().clear();
        assert_eq!(session.ensure_printer(true).await, None);
        assert!(!session.is_available().await);
    }

    #[tokio::test]
    async fn test_detach_keeps_cached_handle() {
        let bus = Arc::new(Bus::default());
        bus.attached.lock().push(PRINTER);
        let session = session(bus.clone());
        session.ensure_printer(false).await;

        bus.attached.lock().clear();
        session.on_detach(&PRINTER);

        assert_eq!(session.current().await, Some(PRINTER));
        assert_eq!(bus.probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_probes_after_settle_delay() {
        let bus = Arc::new(Bus::default());
        let session = Arc::new(session(bus.clone()));
        session.ensure_printer(false).await;
        assert!(!session.is_available().await);

        bus.attached.lock().push(PRINTER);
        let task = {
            let session = session.clone();
            tokio::spawn(async move { session.on_attach(&PRINTER).await })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(bus.probes.load(Ordering::SeqCst), 1);

        assert_eq!(task.await.unwrap(), Some(PRINTER));
        assert_eq!(bus.probes.load(Ordering::SeqCst), 2);
        assert!(session.is_available().await);
    }
}
