//! Per-order print ledger
//!
//! The listener and the reconciler can both see the same pending order
//! (the initial snapshot overlaps the startup pass, a poll can lag behind a
//! status write). The ledger makes printing single-flight per order id and
//! remembers what was printed, so an order is printed at most once by this
//! process even when its `done` write did not go through.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::utils::time::now_millis;

/// Recorded entries are dropped once the store had this long to catch up
const RECORDED_RETENTION_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, Copy)]
struct PrintRecord {
    printed_at: i64,
    /// The `done` status write succeeded
    recorded: bool,
}

#[derive(Default)]
struct LedgerState {
    in_flight: HashSet<String>,
    printed: HashMap<String, PrintRecord>,
}

#[derive(Default)]
pub struct OrderLedger {
    state: Mutex<LedgerState>,
}

/// What the caller may do with an order
pub enum Claim<'a> {
    /// Never printed: print it, then record it
    Print(ClaimGuard<'a>),
    /// Printed at `printed_at` but the status write failed: only record it
    RecordOnly {
        guard: ClaimGuard<'a>,
        printed_at: i64,
    },
    /// Another task is handling this order right now
    InFlight,
    /// Printed and recorded already
    Done,
}

/// Exclusive hold on one order id, released on drop
pub struct ClaimGuard<'a> {
    ledger: &'a OrderLedger,
    id: String,
}

impl ClaimGuard<'_> {
    pub fn mark_printed(&self, at: i64) {
        self.ledger.state.lock().printed.insert(
            self.id.clone(),
            PrintRecord {
                printed_at: at,
                recorded: false,
            },
        );
    }

    pub fn mark_recorded(&self) {
        if let Some(record) = self.ledger.state.lock().printed.get_mut(&self.id) {
            record.recorded = true;
        }
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.ledger.state.lock().in_flight.remove(&self.id);
    }
}

impl OrderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, id: &str) -> Claim<'_> {
        let mut state = self.state.lock();

        let cutoff = now_millis() - RECORDED_RETENTION_MS;
        state
            .printed
            .retain(|_, r| !r.recorded || r.printed_at >= cutoff);

        if state.in_flight.contains(id) {
            return Claim::InFlight;
        }

        let record = state.printed.get(id).copied();
        if matches!(record, Some(r) if r.recorded) {
            return Claim::Done;
        }

        state.in_flight.insert(id.to_string());
        let guard = ClaimGuard {
            ledger: self,
            id: id.to_string(),
        };
        match record {
            Some(r) => Claim::RecordOnly {
                guard,
                printed_at: r.printed_at,
            },
            None => Claim::Print(guard),
        }
    }

    /// Drop unrecorded prints of orders that are no longer pending
    ///
    /// `pending` is the result of a query issued at `queried_at`. Prints
    /// made after that may be missing from it and are kept.
    pub fn forget_settled<'a>(
        &self,
        pending: impl IntoIterator<Item = &'a str>,
        queried_at: i64,
    ) -> usize {
        let pending: HashSet<&str> = pending.into_iter().collect();
        let mut state = self.state.lock();
        let LedgerState { in_flight, printed } = &mut *state;
        let before = printed.len();
        printed.retain(|id, r| {
            r.recorded
                || r.printed_at >= queried_at
                || in_flight.contains(id)
                || pending.contains(id.as_str())
        });
        before - printed.len()
    }

    /// Orders printed whose `done` write is still outstanding
    pub fn unrecorded(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut ids: Vec<_> = state
            .printed
            .iter()
            .filter(|(_, r)| !r.recorded)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
