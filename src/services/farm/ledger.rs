// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use alloy::primitives::B256;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Error,
}

/// Append-only outcome log. Records are opened as pending when a submission
/// begins and resolved to success or error exactly once; they are never
/// deleted, so the tail is a faithful run history.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub index: u32,
    pub status: TxStatus,
    pub hash: Option<B256>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub pending: usize,
    pub success: usize,
    pub error: usize,
}

#[derive(Default)]
pub struct RunLedger {
    records: Mutex<Vec<TransactionRecord>>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, index: u32, message: impl Into<String>) -> Uuid {
        let id = Uuid::new_v4();
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.push(TransactionRecord {
            id,
            index,
            status: TxStatus::Pending,
            hash: None,
            message: message.into(),
            timestamp: Utc::now(),
        });
        id
    }

    pub fn attach_hash(&self, id: Uuid, hash: B256) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.hash = Some(hash);
        }
    }

    /// Resolves a pending record. A second resolution is a bug in the caller
    /// and is dropped with a warning rather than clobbering the outcome.
    pub fn resolve(&self, id: Uuid, status: TxStatus, message: impl Into<String>) {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            tracing::warn!(target: "ledger", %id, "Resolve for unknown record");
            return;
        };
        if record.status != TxStatus::Pending {
            tracing::warn!(target: "ledger", %id, ?status, "Record already resolved; keeping first outcome");
            return;
        }
        record.status = status;
        record.message = message.into();
        record.timestamp = Utc::now();
    }

    pub fn counts(&self) -> LedgerCounts {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut counts = LedgerCounts::default();
        for record in records.iter() {
            match record.status {
                TxStatus::Pending => counts.pending += 1,
                TxStatus::Success => counts.success += 1,
                TxStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn failures(&self) -> Vec<TransactionRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .filter(|r| r.status == TxStatus::Error)
            .cloned()
            .collect()
    }

    /// Last `n` records, oldest first. The full log stays intact.
    pub fn tail(&self, n: usize) -> Vec<TransactionRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }
}

/// Bounded pool of in-flight submission slots. A permit is taken at dispatch
/// and released when the outcome is known, so the number of unresolved
/// transactions can never exceed the configured capacity.
#[derive(Clone)]
pub struct SlotPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl SlotPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AppError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Submission("Slot pool closed".into()))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_resolve_exactly_once() {
        let ledger = RunLedger::new();
        let id = ledger.open(0, "dispatching");
        assert_eq!(ledger.counts().pending, 1);

        ledger.resolve(id, TxStatus::Success, "confirmed");
        assert_eq!(ledger.counts().success, 1);

        // second resolution keeps the first outcome
        ledger.resolve(id, TxStatus::Error, "late failure");
        let counts = ledger.counts();
        assert_eq!(counts.success, 1);
        assert_eq!(counts.error, 0);
    }

    #[test]
    fn tail_preserves_the_full_log() {
        let ledger = RunLedger::new();
        for i in 0..5 {
            ledger.open(i, format!("swap {i}"));
        }
        let tail = ledger.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].index, 3);
        assert_eq!(tail[1].index, 4);
        assert_eq!(ledger.len(), 5);
    }

    #[tokio::test]
    async fn slot_pool_bounds_in_flight_permits() {
        let pool = SlotPool::new(2);
        assert_eq!(pool.capacity(), 2);
        assert!(pool.is_idle());

        let first = pool.acquire().await.expect("first slot");
        let _second = pool.acquire().await.expect("second slot");
        assert_eq!(pool.in_flight(), 2);

        // a third acquire cannot proceed until a slot frees
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            pool.acquire(),
        )
        .await;
        assert!(blocked.is_err());

        drop(first);
        let _third = pool.acquire().await.expect("freed slot");
        assert_eq!(pool.in_flight(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let pool = SlotPool::new(0);
        assert_eq!(pool.capacity(), 1);
    }
}
