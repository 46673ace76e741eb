//! Hotplug monitor
//!
//! Consumes attach/detach events. An attach schedules a settle-then-probe
//! task; a newer attach aborts and replaces it. When the probe finds a
//! printer, pending orders are reconciled before the next event is handled.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::reconciler::Reconciler;
use crate::printing::{DeviceHandle, HotplugEvent, PrinterSession};

type SettleTask = JoinHandle<Option<DeviceHandle>>;

pub struct HotplugMonitor {
    session: Arc<PrinterSession>,
    reconciler: Arc<Reconciler>,
}

/// Resolves when the settle task finishes; never while there is none
async fn settled(task: &mut Option<SettleTask>) -> Result<Option<DeviceHandle>, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

impl HotplugMonitor {
    pub fn new(session: Arc<PrinterSession>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            session,
            reconciler,
        }
    }

    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<HotplugEvent>,
        shutdown: CancellationToken,
    ) {
        info!("Hotplug monitor started");
        let mut settling: Option<SettleTask> = None;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(HotplugEvent::Attached(device)) => {
                        if let Some(previous) = settling.take() {
                            previous.abort();
                            debug!(device = %device, "Attach while settling, rescheduling probe");
                        }
                        let session = self.session.clone();
                        settling = Some(tokio::spawn(async move {
                            session.on_attach(&device).await
                        }));
                    }
                    Some(HotplugEvent::Detached(device)) => self.session.on_detach(&device),
                    None => {
                        warn!("Hotplug event stream closed");
                        break;
                    }
                },
                result = settled(&mut settling) => {
                    settling = None;
                    match result {
                        Ok(Some(printer)) => {
                            info!(printer = %printer, "Printer available after attach, reconciling");
                            if let Err(e) = self.reconciler.reconcile().await {
                                warn!(error = %e, "Reconciliation after attach failed");
                            }
                        }
                        Ok(None) => debug!("No printer after attach"),
                        Err(e) => warn!(error = %e, "Settle task failed"),
                    }
                }
            }
        }

        if let Some(task) = settling.take() {
            task.abort();
        }
        info!("Hotplug monitor stopped");
    }
}
