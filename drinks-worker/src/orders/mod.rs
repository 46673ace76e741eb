//! Shared order queue: document model, store seam and its backends

pub mod firestore;
pub mod memory;
pub mod model;
pub mod store;

pub use firestore::{FirestoreConfig, FirestoreOrderStore};
pub use memory::MemoryOrderStore;
pub use model::{ChangeKind, Order, OrderChange, OrderStatus, OrderUpdate};
pub use store::{ChangeBatch, OrderStore, OrderSubscription, StoreError, StoreResult};
