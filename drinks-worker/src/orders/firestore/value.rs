//! Firestore REST document encoding
//!
//! Documents come back as `{"name": ".../orders/<id>", "fields": {...}}` with
//! every field wrapped in a typed value (`stringValue`, `integerValue`, ...).

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::orders::model::{Order, OrderStatus, OrderUpdate};
use crate::orders::store::StoreError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

/// One element of a `runQuery` response stream
#[derive(Debug, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub document: Option<Document>,
}

impl Document {
    /// Document id (last path segment of the resource name)
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    fn string(&self, key: &str) -> Option<String> {
        self.fields
            .get(key)?
            .get("stringValue")?
            .as_str()
            .map(str::to_string)
    }

    /// Integer-ish field in Unix millis: integerValue (sent as a string),
    /// doubleValue or timestampValue
    fn millis(&self, key: &str) -> Option<i64> {
        let value = self.fields.get(key)?;
        if let Some(s) = value.get("integerValue").and_then(Value::as_str) {
            return s.parse().ok();
        }
        if let Some(n) = value.get("integerValue").and_then(Value::as_i64) {
            return Some(n);
        }
        if let Some(f) = value.get("doubleValue").and_then(Value::as_f64) {
            return Some(f as i64);
        }
        value
            .get("timestampValue")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp_millis())
    }

    pub fn into_order(self) -> Result<Order, StoreError> {
        let id = self.id().to_string();
        let decode_err = |reason: &str| StoreError::Decode {
            id: id.clone(),
            reason: reason.to_string(),
        };

        let drink = self.string("drink").ok_or_else(|| decode_err("missing drink"))?;
        let status = self
            .string("status")
            .and_then(|s| OrderStatus::parse(&s))
            .ok_or_else(|| decode_err("missing or unknown status"))?;

        Ok(Order {
            drink,
            client_name: self.string("clientName").unwrap_or_default(),
            employee_id: self.string("employeeId").unwrap_or_default(),
            timestamp: self.millis("timestamp").unwrap_or_default(),
            status,
            processed_at: self.millis("processedAt"),
            error: self.string("error"),
            id,
        })
    }
}

/// `runQuery` body selecting every pending order of a collection
pub fn pending_query(collection: &str) -> Value {
    json!({
        "structuredQuery": {
            "from": [{ "collectionId": collection }],
            "where": {
                "fieldFilter": {
                    "field": { "fieldPath": "status" },
                    "op": "EQUAL",
                    "value": { "stringValue": OrderStatus::Pending.as_str() }
                }
            }
        }
    })
}

/// PATCH body for a point update; pair with [`OrderUpdate::field_paths`]
pub fn update_body(update: &OrderUpdate) -> Value {
    let mut fields = serde_json::Map::new();
    if let Some(status) = update.status {
        fields.insert("status".into(), json!({ "stringValue": status.as_str() }));
    }
    if let Some(at) = update.processed_at {
        fields.insert("processedAt".into(), json!({ "integerValue": at.to_string() }));
    }
    if let Some(error) = &update.error {
        fields.insert("error".into(), json!({ "stringValue": error }));
    }
    json!({ "fields": fields })
}
