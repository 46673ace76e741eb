//! Order store seam
//!
//! The worker only needs three capabilities from the shared order queue:
//! a pending-orders query, a pending-orders change stream and point updates.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::model::{Order, OrderChange, OrderUpdate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Write failed for order {id}: {reason}")]
    Write { id: String, reason: String },

    #[error("Subscription failed: {0}")]
    Subscribe(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Malformed document {id}: {reason}")]
    Decode { id: String, reason: String },

    #[error("Seed data invalid: {0}")]
    Seed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A batch of changes as delivered by one notification
pub type ChangeBatch = Vec<OrderChange>;

/// Live stream of pending-order changes
///
/// The first batch carries every currently pending order as `Added`.
/// Dropping the subscription stops delivery.
pub struct OrderSubscription {
    rx: mpsc::UnboundedReceiver<ChangeBatch>,
}

impl OrderSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<ChangeBatch>) -> Self {
        Self { rx }
    }

    /// Wait for the next batch; `None` once the store closed the stream
    pub async fn next_batch(&mut self) -> Option<ChangeBatch> {
        self.rx.recv().await
    }
}

/// Shared order queue
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders with `status == pending`, in store order
    async fn query_pending(&self) -> StoreResult<Vec<Order>>;

    /// Subscribe to changes of the `status == pending` set
    async fn subscribe_pending(&self) -> StoreResult<OrderSubscription>;

    /// Atomically set the given fields on one order
    async fn update(&self, id: &str, update: OrderUpdate) -> StoreResult<()>;
}
