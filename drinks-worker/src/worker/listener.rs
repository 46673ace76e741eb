//! Live order listener
//!
//! Follows the pending-orders change stream and prints every newly added
//! order, in delivery order. Modified and removed changes are ignored.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::processor::OrderProcessor;
use crate::orders::{ChangeBatch, ChangeKind, OrderStore};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

pub struct OrderListener {
    store: Arc<dyn OrderStore>,
    processor: Arc<OrderProcessor>,
}

impl OrderListener {
    pub fn new(store: Arc<dyn OrderStore>, processor: Arc<OrderProcessor>) -> Self {
        Self { store, processor }
    }

    /// Run until shutdown, resubscribing when the stream fails or ends
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Order listener started");

        while !shutdown.is_cancelled() {
            match self.store.subscribe_pending().await {
                Ok(mut subscription) => loop {
                    let batch = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        batch = subscription.next_batch() => batch,
                    };
                    match batch {
                        Some(batch) => self.handle_batch(batch).await,
                        None => {
                            warn!("Order subscription closed");
                            break;
                        }
                    }
                },
                Err(e) => warn!(error = %e, "Failed to subscribe to pending orders"),
            }

            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {
                    info!("Resubscribing to pending orders");
                }
            }
        }

        info!("Order listener stopped");
    }

    /// Process the added orders of one batch, one after another
    pub async fn handle_batch(&self, batch: ChangeBatch) {
        for change in batch {
            if change.kind != ChangeKind::Added {
                debug!(order_id = %change.order.id, kind = ?change.kind, "Ignoring change");
                continue;
            }
            let outcome = self.processor.process(&change.order).await;
            debug!(order_id = %change.order.id, ?outcome, "Order handled");
        }
    }
}
