//! Order processing: ledger, finalize path, reconciler, listener and
//! hotplug monitor, wired together by [`Worker`].

pub mod hotplug;
pub mod ledger;
pub mod listener;
pub mod processor;
pub mod reconciler;

use std::sync::Arc;
use std::time::Duration;

use drinks_printer::CodePage;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub use hotplug::HotplugMonitor;
pub use ledger::{Claim, ClaimGuard, OrderLedger};
pub use listener::OrderListener;
pub use processor::{OrderProcessor, ProcessOutcome};
pub use reconciler::{ReconcileReport, Reconciler};

use crate::core::{BackgroundTasks, Config, TaskKind};
use crate::orders::OrderStore;
use crate::printing::{
    DeviceLayer, Discovery, HotplugEvent, PrintJobExecutor, PrinterSession, ReceiptRenderer,
};

/// The printing-related subset of [`Config`]
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub settle_delay: Duration,
    pub paper_width: usize,
    pub code_page: CodePage,
    pub placeholder_name: String,
    pub finalize_retries: u32,
    pub finalize_backoff: Duration,
    pub reconcile_interval: Option<Duration>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            paper_width: 48,
            code_page: CodePage::default(),
            placeholder_name: "Guest".to_string(),
            finalize_retries: 3,
            finalize_backoff: Duration::from_millis(500),
            reconcile_interval: None,
        }
    }
}

impl From<&Config> for WorkerOptions {
    fn from(config: &Config) -> Self {
        Self {
            settle_delay: config.settle_delay,
            paper_width: config.paper_width,
            code_page: config.code_page,
            placeholder_name: config.placeholder_name.clone(),
            finalize_retries: config.finalize_retries,
            reconcile_interval: config.reconcile_interval,
            ..Default::default()
        }
    }
}

/// The assembled worker
pub struct Worker {
    store: Arc<dyn OrderStore>,
    session: Arc<PrinterSession>,
    processor: Arc<OrderProcessor>,
    reconciler: Arc<Reconciler>,
    reconcile_interval: Option<Duration>,
}

impl Worker {
    pub fn new(
        options: WorkerOptions,
        store: Arc<dyn OrderStore>,
        devices: Arc<dyn DeviceLayer>,
    ) -> Self {
        let session = Arc::new(PrinterSession::new(
            Discovery::new(devices.clone()),
            options.settle_delay,
        ));
        let renderer = ReceiptRenderer::new(
            options.paper_width,
            options.code_page,
            options.placeholder_name,
        );
        let executor = Arc::new(PrintJobExecutor::new(session.clone(), devices, renderer));
        let processor = Arc::new(
            OrderProcessor::new(executor, store.clone(), options.finalize_retries)
                .with_retry_backoff(options.finalize_backoff),
        );
        let reconciler = Arc::new(Reconciler::new(store.clone(), processor.clone()));

        Self {
            store,
            session,
            processor,
            reconciler,
            reconcile_interval: options.reconcile_interval,
        }
    }

    pub fn session(&self) -> &Arc<PrinterSession> {
        &self.session
    }

    pub fn processor(&self) -> &Arc<OrderProcessor> {
        &self.processor
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn listener(&self) -> OrderListener {
        OrderListener::new(self.store.clone(), self.processor.clone())
    }

    pub fn hotplug_monitor(&self) -> HotplugMonitor {
        HotplugMonitor::new(self.session.clone(), self.reconciler.clone())
    }

    /// Initial discovery, then a catch-up pass if a printer is attached
    pub async fn startup(&self) -> Option<ReconcileReport> {
        let Some(printer) = self.session.ensure_printer(false).await else {
            warn!("No printer at startup; orders stay pending until one is attached");
            return None;
        };
        info!(printer = %printer, "Printer ready");

        match self.reconciler.reconcile().await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Startup reconciliation failed");
                None
            }
        }
    }

    /// Register the listener, the hotplug monitor (when events are available)
    /// and the periodic reconciliation (when configured)
    pub fn spawn(
        &self,
        tasks: &mut BackgroundTasks,
        hotplug_events: Option<mpsc::UnboundedReceiver<HotplugEvent>>,
    ) {
        let listener = self.listener();
        let token = tasks.shutdown_token();
        tasks.spawn("order_listener", TaskKind::Listener, async move {
            listener.run(token).await;
        });

        if let Some(events) = hotplug_events {
            let monitor = self.hotplug_monitor();
            let token = tasks.shutdown_token();
            tasks.spawn("hotplug_monitor", TaskKind::Listener, async move {
                monitor.run(events, token).await;
            });
        }

        if let Some(interval) = self.reconcile_interval {
            let reconciler = self.reconciler.clone();
            let token = tasks.shutdown_token();
            tasks.spawn("periodic_reconcile", TaskKind::Periodic, async move {
                reconciler.run_periodic(interval, token).await;
            });
        }
    }
}
