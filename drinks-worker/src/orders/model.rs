//! Order documents as stored in the shared order queue

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of an order
///
/// `Done` and `Failed` are written by this worker, `Rejected` by the admin
/// panel. Everything starts as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Done,
    Failed,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Done => "done",
            OrderStatus::Failed => "failed",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "done" => Some(OrderStatus::Done),
            "failed" => Some(OrderStatus::Failed),
            "rejected" => Some(OrderStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A drink order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Store-assigned document id
    pub id: String,
    pub drink: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub employee_id: String,
    /// Creation time (Unix millis)
    pub timestamp: i64,
    pub status: OrderStatus,
    /// Set when the order transitions to `done` (Unix millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<i64>,
    /// Diagnostic set when the order transitions to `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Order {
    /// New pending order, as the ordering screen creates it
    pub fn pending(
        id: impl Into<String>,
        drink: impl Into<String>,
        client_name: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            drink: drink.into(),
            client_name: client_name.into(),
            employee_id: String::new(),
            timestamp,
            status: OrderStatus::Pending,
            processed_at: None,
            error: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }
}

/// Fields written atomically by a point update
///
/// `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub processed_at: Option<i64>,
    pub error: Option<String>,
}

impl OrderUpdate {
    /// Successful print: `status = done`, `processedAt = at`
    pub fn done(at: i64) -> Self {
        Self {
            status: Some(OrderStatus::Done),
            processed_at: Some(at),
            error: None,
        }
    }

    /// Unrecoverable order: `status = failed` with a diagnostic
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(OrderStatus::Failed),
            processed_at: None,
            error: Some(error.into()),
        }
    }

    /// Admin rejection
    pub fn rejected() -> Self {
        Self {
            status: Some(OrderStatus::Rejected),
            ..Default::default()
        }
    }

    /// Names of the fields this update writes, in store field naming
    pub fn field_paths(&self) -> Vec<&'static str> {
        let mut paths = Vec::new();
        if self.status.is_some() {
            paths.push("status");
        }
        if self.processed_at.is_some() {
            paths.push("processedAt");
        }
        if self.error.is_some() {
            paths.push("error");
        }
        paths
    }

    pub fn apply_to(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(at) = self.processed_at {
            order.processed_at = Some(at);
        }
        if let Some(error) = &self.error {
            order.error = Some(error.clone());
        }
    }
}

/// Kind of change delivered by a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Document entered the watched set (includes the initial snapshot)
    Added,
    /// Document still in the set but its fields changed
    Modified,
    /// Document left the set (status changed or deleted)
    Removed,
}

/// One document change inside a notification batch
#[derive(Debug, Clone, PartialEq)]
pub struct OrderChange {
    pub kind: ChangeKind,
    pub order: Order,
}

impl OrderChange {
    pub fn added(order: Order) -> Self {
        Self {
            kind: ChangeKind::Added,
            order,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_wire_format() {
        let json = serde_json::json!({
            "id": "o1",
            "drink": "Mojito",
            "clientName": "Ana",
            "employeeId": "1234",
            "timestamp": 1_700_000_000_000i64,
            "status": "pending"
        });
        let order: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order.client_name, "Ana");
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.processed_at.is_none());
    }

    #[test]
    fn test_done_update_fields() {
        let update = OrderUpdate::done(42);
        assert_eq!(update.field_paths(), vec!["status", "processedAt"]);

        let mut order = Order::pending("o1", "Spritz", "", 1);
        update.apply_to(&mut order);
        assert_eq!(order.status, OrderStatus::Done);
        assert_eq!(order.processed_at, Some(42));
        assert!(order.error.is_none());
    }

    #[test]
    fn test_failed_update_keeps_processed_at() {
        let mut order = Order::pending("o1", "Spritz", "", 1);
        OrderUpdate::failed("paper jam").apply_to(&mut order);
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(order.error.as_deref(), Some("paper jam"));
        assert_eq!(order.processed_at, None);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(OrderStatus::parse("rejected"), Some(OrderStatus::Rejected));
        assert_eq!(OrderStatus::parse("Pending"), None);
        assert_eq!(OrderStatus::Done.to_string(), "done");
    }
}
