//! Append-only record of issued operations and their receipts

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::account::AccountKey;
use crate::engine::Receipt;
use crate::operation::{Operation, OperationKind};

#[derive(Serialize, Clone, Debug)]
pub struct LedgerEntry {
    pub account_key: AccountKey,
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub receipt: Receipt,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory, append-only. Entries are never mutated or removed; process
/// restart loses them by design.
pub struct ReceiptLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl ReceiptLedger {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, op: &Operation, receipt: &Receipt) {
        let entry = LedgerEntry {
            account_key: op.account_key().clone(),
            operation_id: op.id(),
            kind: op.kind(),
            receipt: receipt.clone(),
            recorded_at: Utc::now(),
        };
        debug!(
            account = %entry.account_key,
            operation = %entry.operation_id,
            status = ?entry.receipt.status,
            "receipt recorded"
        );
        self.entries.lock().unwrap().push(entry);
    }

    /// Entries for one account, in recording order.
    pub fn receipts_for(&self, key: &AccountKey) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| &e.account_key == key)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReceiptLedger {
    fn default() -> Self {
        Self::new()
    }
}
