//! In-process order store
//!
//! Keeps orders in insertion order and fans out pending-set changes to every
//! subscriber. Used for local runs without Firestore (optionally seeded from a
//! JSON file) and as the store behind the worker tests.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::model::{ChangeKind, Order, OrderChange, OrderStatus, OrderUpdate};
use super::store::{ChangeBatch, OrderStore, OrderSubscription, StoreError, StoreResult};
use crate::utils::time::now_millis;

#[derive(Default)]
struct Inner {
    orders: Vec<Order>,
    subscribers: Vec<mpsc::UnboundedSender<ChangeBatch>>,
    update_failures: usize,
    query_failures: usize,
    updates_applied: usize,
}

impl Inner {
    fn publish(&mut self, batch: ChangeBatch) {
        if batch.is_empty() {
            return;
        }
        self.subscribers.retain(|tx| tx.send(batch.clone()).is_ok());
    }
}

#[derive(Default)]
pub struct MemoryOrderStore {
    inner: Mutex<Inner>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: Vec<Order>) -> Self {
        let store = Self::new();
        store.inner.lock().orders = orders;
        store
    }

    /// Load orders from a JSON array of order documents
    pub fn from_json_file(path: &Path) -> StoreResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        let orders: Vec<Order> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), count = orders.len(), "Seeded order store");
        Ok(Self::with_orders(orders))
    }

    /// Add a pending order the way the ordering screen does
    pub fn place(&self, drink: &str, client_name: &str, employee_id: &str) -> Order {
        let mut order = Order::pending(
            uuid::Uuid::new_v4().to_string(),
            drink,
            client_name,
            now_millis(),
        );
        order.employee_id = employee_id.to_string();
        self.insert(order.clone());
        order
    }

    /// Insert (or replace) a document, notifying subscribers if it is pending
    pub fn insert(&self, order: Order) {
        let mut inner = self.inner.lock();
        let existing = inner.orders.iter().position(|o| o.id == order.id);
        let was_pending = existing
            .map(|i| inner.orders[i].is_pending())
            .unwrap_or(false);

        let kind = match (was_pending, order.is_pending()) {
            (false, true) => Some(ChangeKind::Added),
            (true, true) => Some(ChangeKind::Modified),
            (true, false) => Some(ChangeKind::Removed),
            (false, false) => None,
        };

        match existing {
            Some(i) => inner.orders[i] = order.clone(),
            None => inner.orders.push(order.clone()),
        }

        if let Some(kind) = kind {
            inner.publish(vec![OrderChange { kind, order }]);
        }
    }

    /// Deliver several new pending orders in one notification batch
    pub fn insert_batch(&self, orders: Vec<Order>) {
        let mut inner = self.inner.lock();
        let mut batch = Vec::with_capacity(orders.len());
        for order in orders {
            if order.is_pending() {
                batch.push(OrderChange::added(order.clone()));
            }
            inner.orders.push(order);
        }
        inner.publish(batch);
    }

    /// Admin rejection, as the admin panel does it
    pub fn reject(&self, id: &str) -> StoreResult<()> {
        let mut order = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        OrderUpdate::rejected().apply_to(&mut order);
        self.insert(order);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        self.inner.lock().orders.iter().find(|o| o.id == id).cloned()
    }

    pub fn all(&self) -> Vec<Order> {
        self.inner.lock().orders.clone()
    }

    /// Number of successful point updates so far
    pub fn updates_applied(&self) -> usize {
        self.inner.lock().updates_applied
    }

    /// Make the next `n` updates fail with a write error
    pub fn fail_next_updates(&self, n: usize) {
        self.inner.lock().update_failures = n;
    }

    /// Make the next `n` pending queries fail
    pub fn fail_next_queries(&self, n: usize) {
        self.inner.lock().query_failures = n;
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn query_pending(&self) -> StoreResult<Vec<Order>> {
        let mut inner = self.inner.lock();
        if inner.query_failures > 0 {
            inner.query_failures -= 1;
            return Err(StoreError::Query("injected failure".to_string()));
        }
        Ok(inner
            .orders
            .iter()
            .filter(|o| o.is_pending())
            .cloned()
            .collect())
    }

    async fn subscribe_pending(&self) -> StoreResult<OrderSubscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();

        let initial: ChangeBatch = inner
            .orders
            .iter()
            .filter(|o| o.is_pending())
            .cloned()
            .map(OrderChange::added)
            .collect();

        // Initial snapshot is always delivered, even when empty
        tx.send(initial)
            .map_err(|e| StoreError::Subscribe(e.to_string()))?;
        inner.subscribers.push(tx);

        Ok(OrderSubscription::new(rx))
    }

    async fn update(&self, id: &str, update: OrderUpdate) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.update_failures > 0 {
            inner.update_failures -= 1;
            return Err(StoreError::Write {
                id: id.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let was_pending = order.is_pending();
        update.apply_to(order);
        let snapshot = order.clone();
        inner.updates_applied += 1;

        let kind = match (was_pending, snapshot.status == OrderStatus::Pending) {
            (true, false) => Some(ChangeKind::Removed),
            (true, true) => Some(ChangeKind::Modified),
            (false, true) => Some(ChangeKind::Added),
            (false, false) => None,
        };
        if let Some(kind) = kind {
            inner.publish(vec![OrderChange {
                kind,
                order: snapshot,
            }]);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_query_returns_pending_in_insertion_order() {
        let store = MemoryOrderStore::new();
        store.insert(Order::pending("b", "Gin Tonic", "Bo", 2));
        store.insert(Order::pending("a", "Mojito", "Al", 1));
        let mut rejected = Order::pending("c", "Beer", "Cy", 3);
        rejected.status = OrderStatus::Rejected;
        store.insert(rejected);

        let pending = store.query_pending().await.unwrap();
        let ids: Vec<_> = pending.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_subscription_initial_snapshot_then_added() {
        let store = MemoryOrderStore::with_orders(vec![Order::pending("a", "Mojito", "", 1)]);
        let mut sub = store.subscribe_pending().await.unwrap();

        let initial = sub.next_batch().await.unwrap();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].kind, ChangeKind::Added);

        store.place("Negroni", "Eve", "7");
        let batch = sub.next_batch().await.unwrap();
        assert_eq!(batch[0].kind, ChangeKind::Added);
        assert_eq!(batch[0].order.drink, "Negroni");
    }

    #[tokio::test]
    async fn test_update_done_emits_removed() {
        let store = MemoryOrderStore::with_orders(vec![Order::pending("a", "Mojito", "", 1)]);
        let mut sub = store.subscribe_pending().await.unwrap();
        let _ = sub.next_batch().await;

        store.update("a", OrderUpdate::done(10)).await.unwrap();

        let batch = sub.next_batch().await.unwrap();
        assert_eq!(batch[0].kind, ChangeKind::Removed);
        assert_eq!(store.get("a").unwrap().processed_at, Some(10));
        assert!(store.query_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_order() {
        let store = MemoryOrderStore::new();
        let err = store.update("nope", OrderUpdate::done(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_injected_update_failure() {
        let store = MemoryOrderStore::with_orders(vec![Order::pending("a", "Mojito", "", 1)]);
        store.fail_next_updates(1);

        assert!(store.update("a", OrderUpdate::done(1)).await.is_err());
        assert!(store.update("a", OrderUpdate::done(2)).await.is_ok());
        assert_eq!(store.updates_applied(), 1);
    }

    #[test]
    fn test_seed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"s1","drink":"Caña","clientName":"Lu","timestamp":5,"status":"pending"}}]"#
        )
        .unwrap();

        let store = MemoryOrderStore::from_json_file(file.path()).unwrap();
        assert_eq!(store.get("s1").unwrap().drink, "Caña");
    }

    #[test]
    fn test_seed_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            MemoryOrderStore::from_json_file(file.path()),
            Err(StoreError::Seed(_))
        ));
    }
}
