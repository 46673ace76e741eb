//! Print job executor
//!
//! One job = one fresh printer session: open, write the rendered receipt,
//! close. A process-wide job lock keeps the physical printer to one session
//! at a time.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::device::{DeviceError, DeviceLayer};
use super::renderer::ReceiptRenderer;
use super::session::PrinterSession;

#[derive(Debug, Error)]
pub enum PrintJobError {
    /// No printer attached, even after a fresh probe
    #[error("No printer available")]
    PrinterUnavailable,

    /// Opening, writing to or closing the printer failed
    #[error("Printer hardware error: {0}")]
    Hardware(#[from] DeviceError),
}

pub type PrintJobResult<T> = Result<T, PrintJobError>;

pub struct PrintJobExecutor {
    session: Arc<PrinterSession>,
    devices: Arc<dyn DeviceLayer>,
    renderer: ReceiptRenderer,
    job_lock: Mutex<()>,
}

impl PrintJobExecutor {
    pub fn new(
        session: Arc<PrinterSession>,
        devices: Arc<dyn DeviceLayer>,
        renderer: ReceiptRenderer,
    ) -> Self {
        Self {
            session,
            devices,
            renderer,
            job_lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Arc<PrinterSession> {
        &self.session
    }

    /// Print one drink receipt
    ///
    /// Exactly one attempt per call. Not idempotent: a retry after a
    /// failure mid-write may print a second receipt.
    #[instrument(skip(self), fields(device = tracing::field::Empty))]
    pub async fn print_order(&self, drink: &str, client_name: &str) -> PrintJobResult<()> {
        let _job = self.job_lock.lock().await;

        let handle = match self.session.current().await {
            Some(handle) => handle,
            None => self
                .session
                .ensure_printer(true)
                .await
                .ok_or(PrintJobError::PrinterUnavailable)?,
        };
        tracing::Span::current().record("device", tracing::field::display(&handle));

        let data = self.renderer.render(drink, client_name);
        let mut connection = match self.devices.open(&handle).await {
            Ok(connection) => connection,
            Err(e) => {
                // Likely a stale handle after a replug; refresh it for the next job
                warn!(error = %e, "Failed to open printer, re-probing");
                self.session.ensure_printer(true).await;
                return Err(e.into());
            }
        };

        let written = connection.write(&data).await;
        let closed = connection.close().await;

        match (written, closed) {
            (Ok(()), Ok(())) => {
                info!(bytes = data.len(), "Receipt printed");
                Ok(())
            }
            (Err(write_err), close_result) => {
                if let Err(close_err) = close_result {
                    warn!(error = %close_err, "Close after failed write also failed");
                }
                Err(write_err.into())
            }
            (Ok(()), Err(close_err)) => Err(close_err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::device::{DeviceHandle, PrinterConnection};
    use crate::printing::discovery::Discovery;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::time::Duration;

    const PRINTER: DeviceHandle = DeviceHandle {
        vendor_id: 0x0519,
        product_id: 0x0003,
        bus: 2,
        address: 11,
    };

    #[derive(Clone, Copy, Default)]
    struct Faults {
        open: bool,
        write: bool,
        close: bool,
    }

    #[derive(Default)]
    struct Journal {
        opened: usize,
        written: Vec<Vec<u8>>,
        closed: usize,
    }

    #[derive(Default)]
    struct FakeBus {
        attached: SyncMutex<Vec<DeviceHandle>>,
        faults: SyncMutex<Faults>,
        journal: Arc<SyncMutex<Journal>>,
    }

    struct FakeConnection {
        faults: Faults,
        journal: Arc<SyncMutex<Journal>>,
    }

    #[async_trait]
    impl DeviceLayer for FakeBus {
        async fn enumerate(&self) -> Result<Vec<DeviceHandle>, DeviceError> {
            Ok(self.attached.lock().clone())
        }

        async fn open(
            &self,
            device: &DeviceHandle,
        ) -> Result<Box<dyn PrinterConnection>, DeviceError> {
            let faults = *self.faults.lock();
            if faults.open {
                return Err(DeviceError::Open {
                    device: device.to_string(),
                    reason: "busy".into(),
                });
            }
            self.journal.lock().opened += 1;
            Ok(Box::new(FakeConnection {
                faults,
                journal: self.journal.clone(),
            }))
        }
    }

    #[async_trait]
    impl PrinterConnection for FakeConnection {
        async fn write(&mut self, data: &[u8]) -> Result<(), DeviceError> {
            if self.faults.write {
                return Err(DeviceError::Write {
                    device: "fake".into(),
                    reason: "paper out".into(),
                });
            }
            self.journal.lock().written.push(data.to_vec());
            Ok(())
        }

        async fn close(self: Box<Self>) -> Result<(), DeviceError> {
            self.journal.lock().closed += 1;
            if self.faults.close {
                return Err(DeviceError::Close {
                    device: "fake".into(),
                    reason: "stall".into(),
                });
            }
            Ok(())
        }
    }

    fn executor(bus: Arc<FakeBus>) -> PrintJobExecutor {
        let session = Arc::new(PrinterSession::new(
            Discovery::new(bus.clone()),
            Duration::from_millis(10),
        ));
        PrintJobExecutor::new(session, bus, ReceiptRenderer::default())
    }

    #[tokio::test]
    async fn test_print_success() {
        let bus = Arc::new(FakeBus::default());
        bus.attached.lock().push(PRINTER);
        let executor = executor(bus.clone());

        executor.print_order("Mojito", "Ana").await.unwrap();

        let journal = bus.journal.lock();
        assert_eq!(journal.opened, 1);
        assert_eq!(journal.closed, 1);
        assert!(
            journal.written[0]
                .windows(7)
                .any(|w| w == b"Mojito\n")
        );
    }

    #[tokio::test]
    async fn test_no_printer_is_unavailable() {
        let bus = Arc::new(FakeBus::default());
        let executor = executor(bus.clone());

        let err = executor.print_order("Mojito", "Ana").await.unwrap_err();
        assert!(matches!(err, PrintJobError::PrinterUnavailable));
        assert_eq!(bus.journal.lock().opened, 0);
    }

    #[tokio::test]
    async fn test_adopts_printer_found_mid_call() {
        let bus = Arc::new(FakeBus::default());
        let executor = executor(bus.clone());
        assert_eq!(executor.session().ensure_printer(false).await, None);

        bus.attached.lock().push(PRINTER);
        executor.print_order("Spritz", "").await.unwrap();

        assert_eq!(executor.session().current().await, Some(PRINTER));
        assert_eq!(bus.journal.lock().written.len(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_skips_write() {
        let bus = Arc::new(FakeBus::default());
        bus.attached.lock().push(PRINTER);
        bus.faults.lock().open = true;
        let executor = executor(bus.clone());

        let err = executor.print_order("Mojito", "Ana").await.unwrap_err();
        assert!(matches!(err, PrintJobError::Hardware(DeviceError::Open { .. })));
        assert!(bus.journal.lock().written.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_still_closes() {
        let bus = Arc::new(FakeBus::default());
        bus.attached.lock().push(PRINTER);
        bus.faults.lock().write = true;
        let executor = executor(bus.clone());

        let err = executor.print_order("Mojito", "Ana").await.unwrap_err();
        assert!(matches!(err, PrintJobError::Hardware(DeviceError::Write { .. })));
        assert_eq!(bus.journal.lock().closed, 1);
    }

    #[tokio::test]
    async fn test_close_failure_is_hardware_error() {
        let bus = Arc::new(FakeBus::default());
        bus.attached.lock().push(PRINTER);
        bus.faults.lock().close = true;
        let executor = executor(bus.clone());

        let err = executor.print_order("Mojito", "Ana").await.unwrap_err();
        assert!(matches!(err, PrintJobError::Hardware(DeviceError::Close { .. })));
        assert_eq!(bus.journal.lock().written.len(), 1);
    }
}
