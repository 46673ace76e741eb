//! Print-then-finalize path shared by the listener and the reconciler

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use super::ledger::{Claim, ClaimGuard, OrderLedger};
use crate::orders::{Order, OrderStore, OrderUpdate, StoreError};
use crate::printing::PrintJobExecutor;
use crate::utils::time::now_millis;

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Result of feeding one order through the finalize path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Printed and marked `done`
    Printed,
    /// Printed earlier; the outstanding `done` write went through now
    Recorded,
    /// Print failed; the order stays `pending` for a later pass
    Deferred,
    /// Not pending, already handled, or being handled elsewhere
    Skipped,
    /// Printed, but the `done` write kept failing
    Unrecorded,
}

pub struct OrderProcessor {
    executor: Arc<PrintJobExecutor>,
    store: Arc<dyn OrderStore>,
    ledger: OrderLedger,
    finalize_retries: u32,
    retry_backoff: Duration,
}

impl OrderProcessor {
    pub fn new(
        executor: Arc<PrintJobExecutor>,
        store: Arc<dyn OrderStore>,
        finalize_retries: u32,
    ) -> Self {
        Self {
            executor,
            store,
            ledger: OrderLedger::new(),
            finalize_retries: finalize_retries.max(1),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Base delay between `done` write attempts, doubled after each failure
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn executor(&self) -> &Arc<PrintJobExecutor> {
        &self.executor
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    /// Print the order and mark it `done`; on print failure leave it untouched
    #[instrument(skip(self, order), fields(order_id = %order.id, drink = %order.drink))]
    pub async fn process(&self, order: &Order) -> ProcessOutcome {
        if !order.is_pending() {
            debug!(status = %order.status, "Order no longer pending");
            return ProcessOutcome::Skipped;
        }

        let guard = match self.ledger.claim(&order.id) {
            Claim::Print(guard) => guard,
            Claim::RecordOnly { guard, printed_at } => {
                info!("Order already printed, retrying status write only");
                return match self.finalize(&guard, &order.id, printed_at).await {
                    ProcessOutcome::Printed => ProcessOutcome::Recorded,
                    other => other,
                };
            }
            Claim::InFlight => {
                debug!("Order is being processed elsewhere");
                return ProcessOutcome::Skipped;
            }
            Claim::Done => {
                debug!("Order already printed and recorded");
                return ProcessOutcome::Skipped;
            }
        };

        match self
            .executor
            .print_order(&order.drink, &order.client_name)
            .await
        {
            Ok(()) => {
                let printed_at = now_millis();
                guard.mark_printed(printed_at);
                self.finalize(&guard, &order.id, printed_at).await
            }
            Err(e) => {
                warn!(error = %e, "Print failed, order stays pending");
                ProcessOutcome::Deferred
            }
        }
    }

    /// Write `status = done` with bounded retries
    async fn finalize(&self, guard: &ClaimGuard<'_>, id: &str, printed_at: i64) -> ProcessOutcome {
        let mut backoff = self.retry_backoff;

        for attempt in 1..=self.finalize_retries {
            match self.store.update(id, OrderUpdate::done(printed_at)).await {
                Ok(()) => {
                    guard.mark_recorded();
                    info!(processed_at = printed_at, "Order marked done");
                    return ProcessOutcome::Printed;
                }
                Err(StoreError::NotFound(_)) => {
                    // Deleted upstream; nothing left to record
                    warn!("Order disappeared before it could be marked done");
                    guard.mark_recorded();
                    return ProcessOutcome::Printed;
                }
                Err(e) => {
                    warn!(attempt, max = self.finalize_retries, error = %e, "Failed to mark order done");
                    if attempt < self.finalize_retries {
                        tokio::time::sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }

        error!("Order printed but not recorded; only the status write will be retried");
        ProcessOutcome::Unrecorded
    }
}
