//! Firestore-backed order store (REST API)
//!
//! - Pending query: `documents:runQuery` with a `status == pending` filter
//! - Updates: `PATCH` with an update mask and an `exists` precondition
//! - Change stream: the pending query is polled and diffed against the
//!   previous snapshot, yielding added/modified/removed changes

mod auth;
mod value;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use self::auth::{Credentials, ServiceAccountKey, TokenProvider};
use self::value::{QueryResult, pending_query, update_body};
use super::model::{ChangeKind, Order, OrderChange, OrderUpdate};
use super::store::{ChangeBatch, OrderStore, OrderSubscription, StoreError, StoreResult};

const PRODUCTION_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Connection settings for [`FirestoreOrderStore`]
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// Falls back to the service account's project when absent
    pub project_id: Option<String>,
    pub collection: String,
    pub credentials_path: PathBuf,
    /// `host:port` of a local emulator; disables authentication
    pub emulator_host: Option<String>,
    pub poll_interval: Duration,
}

struct Inner {
    http: reqwest::Client,
    tokens: TokenProvider,
    /// `{base}/projects/{project}/databases/(default)/documents`
    documents_url: String,
    collection: String,
    poll_interval: Duration,
}

#[derive(Clone)]
pub struct FirestoreOrderStore {
    inner: Arc<Inner>,
}

impl FirestoreOrderStore {
    pub fn connect(config: FirestoreConfig) -> StoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let (base_url, credentials, key_project) = match &config.emulator_host {
            Some(host) => (format!("http://{}/v1", host), Credentials::Emulator, None),
            None => {
                let key = ServiceAccountKey::from_file(&config.credentials_path)?;
                let project = key.project_id.clone();
                (
                    PRODUCTION_BASE_URL.to_string(),
                    Credentials::ServiceAccount(key),
                    project,
                )
            }
        };

        let project_id = config.project_id.or(key_project).ok_or_else(|| {
            StoreError::Auth("no project id configured or present in credentials".to_string())
        })?;

        info!(
            project = %project_id,
            collection = %config.collection,
            emulator = config.emulator_host.is_some(),
            "Firestore order store configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                tokens: TokenProvider::new(http.clone(), credentials),
                http,
                documents_url: format!(
                    "{}/projects/{}/databases/(default)/documents",
                    base_url, project_id
                ),
                collection: config.collection,
                poll_interval: config.poll_interval,
            }),
        })
    }
}

impl Inner {
    async fn run_pending_query(&self) -> StoreResult<Vec<Order>> {
        let token = self.tokens.bearer().await?;
        let response = self
            .http
            .post(format!("{}:runQuery", self.documents_url))
            .bearer_auth(token)
            .json(&pending_query(&self.collection))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Query(format!("{}: {}", status, body)));
        }

        let results: Vec<QueryResult> = response.json().await?;
        let mut orders = Vec::with_capacity(results.len());
        for document in results.into_iter().filter_map(|r| r.document) {
            match document.into_order() {
                Ok(order) => orders.push(order),
                // One malformed document must not hide the rest of the queue
                Err(e) => warn!(error = %e, "Skipping malformed order document"),
            }
        }
        Ok(orders)
    }
}

/// Diff a fresh pending snapshot against the previously seen one
///
/// Added and modified changes follow the snapshot order; removals come last.
fn diff_snapshot(known: &mut HashMap<String, Order>, current: Vec<Order>) -> ChangeBatch {
    let mut batch = Vec::new();
    let mut next = HashMap::with_capacity(current.len());

    for order in current {
        let kind = match known.remove(&order.id) {
            None => Some(ChangeKind::Added),
            Some(previous) if previous != order => Some(ChangeKind::Modified),
            Some(_) => None,
        };
        if let Some(kind) = kind {
            batch.push(OrderChange {
                kind,
                order: order.clone(),
            });
        }
        next.insert(order.id.clone(), order);
    }

    let mut removed: Vec<Order> = known.drain().map(|(_, order)| order).collect();
    removed.sort_by_key(|o| o.timestamp);
    batch.extend(removed.into_iter().map(|order| OrderChange {
        kind: ChangeKind::Removed,
        order,
    }));

    *known = next;
    batch
}

#[async_trait]
impl OrderStore for FirestoreOrderStore {
    #[instrument(skip(self))]
    async fn query_pending(&self) -> StoreResult<Vec<Order>> {
        self.inner.run_pending_query().await
    }

    async fn subscribe_pending(&self) -> StoreResult<OrderSubscription> {
        let initial = self.inner.run_pending_query().await?;
        let mut known: HashMap<String, Order> = HashMap::new();
        let first = diff_snapshot(&mut known, initial);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(first)
            .map_err(|e| StoreError::Subscribe(e.to_string()))?;

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately and the initial snapshot is already sent
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }

                match inner.run_pending_query().await {
                    Ok(orders) => {
                        let batch = diff_snapshot(&mut known, orders);
                        if batch.is_empty() {
                            continue;
                        }
                        debug!(changes = batch.len(), "Pending orders changed");
                        if tx.send(batch).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Pending order poll failed"),
                }
            }
            debug!("Firestore subscription closed");
        });

        Ok(OrderSubscription::new(rx))
    }

    #[instrument(skip(self, update), fields(fields = ?update.field_paths()))]
    async fn update(&self, id: &str, update: OrderUpdate) -> StoreResult<()> {
        let token = self.inner.tokens.bearer().await?;

        let mut query: Vec<(&str, &str)> = update
            .field_paths()
            .into_iter()
            .map(|path| ("updateMask.fieldPaths", path))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let response = self
            .inner
            .http
            .patch(format!(
                "{}/{}/{}",
                self.inner.documents_url, self.inner.collection, id
            ))
            .bearer_auth(token)
            .query(&query)
            .json(&update_body(&update))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(id.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::Write {
                    id: id.to_string(),
                    reason: format!("{}: {}", status, body),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::model::OrderStatus;

    fn order(id: &str, ts: i64) -> Order {
        Order::pending(id, "Mojito", "Ana", ts)
    }

    #[test]
    fn test_first_snapshot_is_all_added() {
        let mut known = HashMap::new();
        let batch = diff_snapshot(&mut known, vec![order("a", 1), order("b", 2)]);

        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|c| c.kind == ChangeKind::Added));
        assert_eq!(batch[0].order.id, "a");
        assert_eq!(known.len(), 2);
    }

    #[test]
    fn test_unchanged_snapshot_is_empty() {
        let mut known = HashMap::new();
        diff_snapshot(&mut known, vec![order("a", 1)]);
        assert!(diff_snapshot(&mut known, vec![order("a", 1)]).is_empty());
    }

    #[test]
    fn test_added_modified_removed() {
        let mut known = HashMap::new();
        diff_snapshot(&mut known, vec![order("a", 1), order("b", 2)]);

        let mut renamed = order("b", 2);
        renamed.client_name = "Bea".into();
        let batch = diff_snapshot(&mut known, vec![renamed, order("c", 3)]);

        let kinds: Vec<_> = batch
            .iter()
            .map(|c| (c.order.id.as_str(), c.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("b", ChangeKind::Modified),
                ("c", ChangeKind::Added),
                ("a", ChangeKind::Removed),
            ]
        );
        assert_eq!(known.len(), 2);
        assert!(known.values().all(|o| o.status == OrderStatus::Pending));
    }

    #[test]
    fn test_emulator_needs_no_credentials() {
        let store = FirestoreOrderStore::connect(FirestoreConfig {
            project_id: Some("bar".into()),
            collection: "orders".into(),
            credentials_path: PathBuf::from("/nonexistent.json"),
            emulator_host: Some("localhost:8080".into()),
            poll_interval: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(
            store.inner.documents_url,
            "http://localhost:8080/v1/projects/bar/databases/(default)/documents"
        );
    }

    #[test]
    fn test_missing_project_id() {
        let result = FirestoreOrderStore::connect(FirestoreConfig {
            project_id: None,
            collection: "orders".into(),
            credentials_path: PathBuf::from("/nonexistent.json"),
            emulator_host: Some("localhost:8080".into()),
            poll_interval: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(StoreError::Auth(_))));
    }
}
