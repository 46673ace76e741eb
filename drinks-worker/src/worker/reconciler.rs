//! Pending order reconciliation
//!
//! Catches up on orders that arrived while the printer was missing: query
//! everything still `pending` and feed it through the finalize path, one
//! order at a time, in query order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::processor::{OrderProcessor, ProcessOutcome};
use crate::orders::{OrderStore, StoreResult};
use crate::utils::time::now_millis;

/// Counts of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub pending: usize,
    pub printed: usize,
    pub recorded: usize,
    pub deferred: usize,
    pub skipped: usize,
    pub unrecorded: usize,
}

impl ReconcileReport {
    fn record(&mut self, outcome: ProcessOutcome) {
        match outcome {
            ProcessOutcome::Printed => self.printed += 1,
            ProcessOutcome::Recorded => self.recorded += 1,
            ProcessOutcome::Deferred => self.deferred += 1,
            ProcessOutcome::Skipped => self.skipped += 1,
            ProcessOutcome::Unrecorded => self.unrecorded += 1,
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn OrderStore>,
    processor: Arc<OrderProcessor>,
    /// Keeps passes from interleaving (startup, attach and periodic triggers)
    pass: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn OrderStore>, processor: Arc<OrderProcessor>) -> Self {
        Self {
            store,
            processor,
            pass: Mutex::new(()),
        }
    }

    /// Run one pass; only the pending query itself can fail
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> StoreResult<ReconcileReport> {
        let _pass = self.pass.lock().await;

        let queried_at = now_millis();
        let pending = self.store.query_pending().await?;
        let forgotten = self
            .processor
            .ledger()
            .forget_settled(pending.iter().map(|o| o.id.as_str()), queried_at);
        if forgotten > 0 {
            debug!(forgotten, "Dropped unrecorded prints of settled orders");
        }
        let mut report = ReconcileReport {
            pending: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            debug!("No pending orders");
            return Ok(report);
        }

        info!(count = pending.len(), "Reconciling pending orders");
        for order in &pending {
            report.record(self.processor.process(order).await);
        }

        info!(
            printed = report.printed,
            recorded = report.recorded,
            deferred = report.deferred,
            skipped = report.skipped,
            unrecorded = report.unrecorded,
            "Reconciliation finished"
        );
        Ok(report)
    }

    /// Reconcile on a fixed interval until shutdown
    ///
    /// Fallback for platforms without hotplug notifications: each tick
    /// probes for a printer when none is cached and skips the pass if
    /// there still is none.
    pub async fn run_periodic(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let session = self.processor.executor().session().clone();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        info!(interval_secs = interval.as_secs(), "Periodic reconciliation started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Periodic reconciliation stopping");
                    break;
                }
                _ = ticker.tick() => {}
            }

            if session.ensure_printer(false).await.is_none() {
                debug!("No printer, skipping periodic reconciliation");
                continue;
            }
            if let Err(e) = self.reconcile().await {
                warn!(error = %e, "Periodic reconciliation failed");
            }
        }
    }
}
