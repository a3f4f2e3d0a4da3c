//! Local queue of check-ins that could not reach the backend.
//!
//! Guarantees:
//! - An empty outbox never makes a network call.
//! - A failed sync leaves the outbox untouched.
//! - Items the server reports `success` or `skipped` are removed; `failed`
//!   and unmentioned items stay for the next sync.
//! - Items queued while a sync is in flight are kept.
//! - Syncs are serialized; two overlapping calls never send the same batch.
use std::sync::Arc;

use common::logger::warn_if_slow;
use gateway::types::{AttendanceSubmission, SyncResult, SyncStatus};
use gateway::{AttendanceApi, ClientError};
use parking_lot::Mutex;
use session::{KeyValueStore, StorageError};
use tracing::{debug, info, instrument, warn};

pub const OUTBOX_KEY: &str = "attendance_outbox";

/// Outcome of one [`Outbox::sync`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub sent: usize,
    pub removed: usize,
    pub remaining: usize,
    /// `None` when nothing was sent.
    pub result: Option<SyncResult>,
}

/// Cheap to clone; clones share the same queue.
#[derive(Clone, Default)]
pub struct Outbox {
    items: Arc<Mutex<Vec<AttendanceSubmission>>>,
    sync_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<AttendanceSubmission>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items)),
            ..Self::default()
        }
    }

    pub fn push(&self, submission: AttendanceSubmission) {
        let mut items = self.items.lock();
        items.push(submission);
        info!(target: "outbox", pending = items.len(), "check-in queued for sync");
    }

    pub fn snapshot(&self) -> Vec<AttendanceSubmission> {
        self.items.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Sends every queued check-in in one batch and drops the ones the
    /// server accepted or already had.
    #[instrument(skip_all, target = "outbox", fields(pending = self.len()))]
    pub async fn sync(&self, api: &dyn AttendanceApi) -> Result<SyncReport, ClientError> {
        let _serial = self.sync_lock.lock().await;

        let batch = self.snapshot();
        if batch.is_empty() {
            debug!("outbox empty; nothing to sync");
            return Ok(SyncReport::default());
        }

        let result = warn_if_slow(
            "outbox_sync",
            std::time::Duration::from_secs(5),
            api.sync_attendance(&batch),
        )
        .await
        .inspect_err(|e| warn!(error = %e, "outbox sync failed; keeping all items"))?;

        let mut settled: Vec<&AttendanceSubmission> = result
            .details
            .iter()
            .filter(|d| matches!(d.status, SyncStatus::Success | SyncStatus::Skipped))
            .map(|d| &d.data)
            .collect();

        let mut items = self.items.lock();
        // Only pushes can happen while a sync holds `sync_lock`, so the
        // batch is still the prefix of the queue.
        let split_at = batch.len().min(items.len());
        let queued_since = items.split_off(split_at);

        let before = items.len();
        items.retain(|item| {
            match settled.iter().position(|done| same_check_in(done, item)) {
                Some(i) => {
                    settled.swap_remove(i);
                    false
                }
                None => true,
            }
        });
        let removed = before - items.len();
        items.extend(queued_since);

        for d in result.details.iter().filter(|d| d.status == SyncStatus::Failed) {
            warn!(
                session_id = %d.data.session_id(),
                error = d.error.as_deref().unwrap_or("unknown"),
                "server rejected queued check-in"
            );
        }

        let report = SyncReport {
            sent: batch.len(),
            removed,
            remaining: items.len(),
            result: Some(result),
        };
        info!(
            sent = report.sent,
            removed = report.removed,
            remaining = report.remaining,
            "outbox synced"
        );
        Ok(report)
    }

    /// Loads the persisted queue. Missing, unreadable or corrupt entries give
    /// an empty outbox.
    #[instrument(skip_all, target = "outbox")]
    pub async fn restore(store: &dyn KeyValueStore) -> Self {
        let raw = match store.get(OUTBOX_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::new(),
            Err(e) => {
                warn!(error = %e, "failed to read stored outbox; starting empty");
                return Self::new();
            }
        };

        match serde_json::from_str::<Vec<AttendanceSubmission>>(&raw) {
            Ok(items) => {
                debug!(pending = items.len(), "outbox restored");
                Self::from_items(items)
            }
            Err(e) => {
                warn!(error = %e, "stored outbox is corrupt; starting empty");
                Self::new()
            }
        }
    }

    #[instrument(skip_all, target = "outbox", fields(pending = self.len()))]
    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        let items = self.snapshot();
        if items.is_empty() {
            return store
                .delete(OUTBOX_KEY)
                .await
                .map_err(|e| StorageError::delete(OUTBOX_KEY, e));
        }

        let json = serde_json::to_string(&items).map_err(|source| StorageError::Serialize {
            key: OUTBOX_KEY,
            source,
        })?;
        store
            .set(OUTBOX_KEY, &json)
            .await
            .map_err(|e| StorageError::write(OUTBOX_KEY, e))
    }
}

/// The backend keys check-ins by session, class and schedule; coordinates
/// may not survive a JSON round trip bit for bit.
fn same_check_in(a: &AttendanceSubmission, b: &AttendanceSubmission) -> bool {
    a.session_id() == b.session_id()
        && a.class_id() == b.class_id()
        && a.schedule_id() == b.schedule_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway::types::Coordinates;
    use session::store::MemoryStore;

    fn item(session: &str) -> AttendanceSubmission {
        AttendanceSubmission::new(
            session,
            "c1",
            "sch1",
            Coordinates::new(1.0, 2.0).unwrap(),
            true,
            vec![],
        )
    }

    #[tokio::test]
    async fn persist_then_restore() {
        let store = MemoryStore::new();
        let outbox = Outbox::from_items(vec![item("s1"), item("s2")]);

        outbox.persist(&store).await.unwrap();
        let restored = Outbox::restore(&store).await;

        assert_eq!(restored.snapshot(), outbox.snapshot());
    }

    #[tokio::test]
    async fn corrupt_entry_restores_empty() {
        let store = MemoryStore::new();
        store.set(OUTBOX_KEY, "{not json").await.unwrap();

        assert!(Outbox::restore(&store).await.is_empty());
    }

    #[tokio::test]
    async fn persisting_empty_outbox_removes_entry() {
        let store = MemoryStore::new();
        store.set(OUTBOX_KEY, "[]").await.unwrap();

        Outbox::new().persist(&store).await.unwrap();
        assert_eq!(store.get(OUTBOX_KEY).await.unwrap(), None);
    }

    #[test]
    fn clones_share_the_queue() {
        let a = Outbox::new();
        let b = a.clone();
        a.push(item("s1"));
        assert_eq!(b.len(), 1);
    }
}
