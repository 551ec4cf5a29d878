//! Live collection of tracked uploads.
//!
//! [`UploadRegistry`] is the single owner of every [`UploadRecord`]. Records
//! are only ever changed through the registry's methods; observers get owned
//! copies, either on demand via [`UploadRegistry::snapshot`] or pushed through
//! [`UploadRegistry::watch`] and [`UploadRegistry::subscribe`].
//!
//! Operations on unknown ids are silently ignored: a record may already have
//! been removed (by the user, or by the completion timer) while a callback of
//! its upload is still in flight.

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::TrackingConfig;
use crate::types::{Event, UploadId, UploadRecord, UploadStats, UploadStatus};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// State shared by every clone of a registry
struct Shared {
    /// Records in display order (newest first)
    records: Mutex<VecDeque<UploadRecord>>,
    /// Latest snapshot, replaced on every mutation
    snapshot_tx: watch::Sender<Vec<UploadRecord>>,
    /// Lifecycle event broadcast channel (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// How long completed records stay visible
    completed_retention: Duration,
}

/// Registry of live uploads (cloneable - clones share the same collection)
#[derive(Clone)]
pub struct UploadRegistry {
    shared: Arc<Shared>,
}

impl Default for UploadRegistry {
    fn default() -> Self {
        Self::new(&TrackingConfig::default())
    }
}

impl std::fmt::Debug for UploadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadRegistry")
            .field("records", &self.lock().len())
            .field("completed_retention", &self.shared.completed_retention)
            .finish()
    }
}

impl UploadRegistry {
    /// Create an empty registry
    pub fn new(config: &TrackingConfig) -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            shared: Arc::new(Shared {
                records: Mutex::new(VecDeque::new()),
                snapshot_tx,
                event_tx,
                completed_retention: config.completed_retention,
            }),
        }
    }

    /// Register a new upload in the `Pending` state and return its id
    ///
    /// The record is placed at the front of the collection, so snapshots list
    /// the most recently started upload first.
    pub fn create(&self, file_name: impl Into<String>, file_size: u64) -> UploadId {
        let id = UploadId::generate();
        let record = UploadRecord::new(id.clone(), file_name.into(), file_size);
        let event = Event::Created {
            id: id.clone(),
            file_name: record.file_name.clone(),
            file_size,
        };

        let mut records = self.lock();
        records.push_front(record);
        self.publish(&records, event);
        drop(records);

        tracing::debug!(upload_id = %id, file_size, "upload registered");
        id
    }

    /// Record byte progress for an upload
    ///
    /// Moves a `Pending` upload to `Uploading`. Progress never decreases and is
    /// clamped to 100. Ignored once the upload has left `Uploading`.
    pub fn update_progress(&self, id: &UploadId, percent: u8) {
        let percent = percent.min(100);
        self.mutate(id, |record| {
            if !record.status.can_transition_to(UploadStatus::Uploading) {
                tracing::trace!(
                    upload_id = %record.id,
                    status = %record.status,
                    "ignoring progress for upload past uploading stage"
                );
                return None;
            }
            let started = record.status == UploadStatus::Pending;
            if !started && percent <= record.progress {
                return None;
            }
            record.status = UploadStatus::Uploading;
            record.progress = record.progress.max(percent);
            Some(Event::Progress {
                id: record.id.clone(),
                percent: record.progress,
            })
        });
    }

    /// All bytes have been sent; the server is still finishing its own work
    pub fn mark_processing(&self, id: &UploadId) {
        self.transition(id, UploadStatus::Processing, |record| {
            record.progress = 100;
            Event::Processing {
                id: record.id.clone(),
            }
        });
    }

    /// The server accepted the upload
    ///
    /// The record is removed automatically once the configured retention delay
    /// (3000 ms by default) has elapsed.
    pub fn mark_completed(&self, id: &UploadId) {
        let applied = self.transition(id, UploadStatus::Completed, |record| {
            record.progress = 100;
            Event::Completed {
                id: record.id.clone(),
            }
        });
        if applied {
            self.schedule_removal(id.clone());
        }
    }

    /// The upload failed; `message` is shown to the user
    ///
    /// Returns `true` if the record moved to `Error`, `false` if it was unknown
    /// or already terminal.
    pub fn mark_failed(&self, id: &UploadId, message: impl Into<String>) -> bool {
        let message = message.into();
        self.transition(id, UploadStatus::Error, |record| {
            record.error_message = Some(message.clone());
            Event::Failed {
                id: record.id.clone(),
                error: message,
            }
        })
    }

    /// Remove a finished upload
    ///
    /// Returns `true` if a record was removed. Removing an unknown id (never
    /// created, or already removed) is a silent no-op. Records that are still
    /// active are left untouched.
    pub fn remove(&self, id: &UploadId) -> bool {
        let mut records = self.lock();
        let Some(index) = records.iter().position(|r| &r.id == id) else {
            return false;
        };
        if records[index].status.is_active() {
            tracing::debug!(
                upload_id = %id,
                status = %records[index].status,
                "refusing to remove active upload"
            );
            return false;
        }
        records.remove(index);
        self.publish(&records, Event::Removed { id: id.clone() });
        true
    }

    /// Remove every completed or failed upload, returning how many were removed
    pub fn clear_finished(&self) -> usize {
        let mut records = self.lock();
        let finished: Vec<UploadId> = records
            .iter()
            .filter(|r| r.status.is_terminal())
            .map(|r| r.id.clone())
            .collect();
        if finished.is_empty() {
            return 0;
        }

        records.retain(|r| r.status.is_active());
        self.shared
            .snapshot_tx
            .send_replace(records.iter().cloned().collect());
        for id in &finished {
            self.shared.event_tx.send(Event::Removed { id: id.clone() }).ok();
        }
        finished.len()
    }

    /// Copy of the collection in display order (newest first)
    pub fn snapshot(&self) -> Vec<UploadRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Copy of a single record
    pub fn get(&self, id: &UploadId) -> Option<UploadRecord> {
        self.lock().iter().find(|r| &r.id == id).cloned()
    }

    /// Whether any upload is pending, uploading or processing
    pub fn has_active(&self) -> bool {
        self.lock().iter().any(|r| r.status.is_active())
    }

    /// Number of tracked uploads
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the registry tracks no uploads at all
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Aggregate counts and progress
    pub fn stats(&self) -> UploadStats {
        let records = self.lock();
        let mut stats = UploadStats {
            total: records.len(),
            ..Default::default()
        };

        let mut active_bytes: u64 = 0;
        let mut weighted_progress: f64 = 0.0;
        let mut active_count: usize = 0;
        let mut progress_sum: f64 = 0.0;

        for record in records.iter() {
            stats.total_size_bytes += record.file_size;
            match record.status {
                UploadStatus::Pending => stats.pending += 1,
                UploadStatus::Uploading => stats.uploading += 1,
                UploadStatus::Processing => stats.processing += 1,
                UploadStatus::Completed => stats.completed += 1,
                UploadStatus::Error => stats.failed += 1,
            }
            if record.status.is_active() {
                active_count += 1;
                active_bytes += record.file_size;
                weighted_progress += record.file_size as f64 * f64::from(record.progress);
                progress_sum += f64::from(record.progress);
            }
        }

        stats.overall_progress = if active_bytes > 0 {
            (weighted_progress / active_bytes as f64) as f32
        } else if active_count > 0 {
            (progress_sum / active_count as f64) as f32
        } else {
            0.0
        };
        stats
    }

    /// Subscribe to snapshots
    ///
    /// The receiver always holds the latest snapshot; every mutation replaces
    /// it before the mutating call returns.
    pub fn watch(&self) -> watch::Receiver<Vec<UploadRecord>> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Subscribe to lifecycle events, delivered in mutation order
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.event_tx.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<UploadRecord>> {
        // Every mutation leaves the collection consistent, so a poisoned lock
        // still guards valid data.
        self.shared
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` to the record with `id`, publishing the event it returns.
    /// Returns whether anything changed.
    fn mutate<F>(&self, id: &UploadId, f: F) -> bool
    where
        F: FnOnce(&mut UploadRecord) -> Option<Event>,
    {
        let mut records = self.lock();
        let Some(record) = records.iter_mut().find(|r| &r.id == id) else {
            tracing::trace!(upload_id = %id, "ignoring update for unknown upload");
            return false;
        };
        match f(record) {
            Some(event) => {
                self.publish(&records, event);
                true
            }
            None => false,
        }
    }

    /// Move a record to `next` if the state machine allows it
    fn transition<F>(&self, id: &UploadId, next: UploadStatus, apply: F) -> bool
    where
        F: FnOnce(&mut UploadRecord) -> Event,
    {
        self.mutate(id, |record| {
            if !record.status.can_transition_to(next) {
                tracing::debug!(
                    upload_id = %record.id,
                    from = %record.status,
                    to = %next,
                    "ignoring invalid status transition"
                );
                return None;
            }
            tracing::debug!(
                upload_id = %record.id,
                from = %record.status,
                to = %next,
                "upload status changed"
            );
            record.status = next;
            Some(apply(record))
        })
    }

    /// Push the current state to watchers, then the event to subscribers.
    /// Called with the lock held so observers see mutations in order.
    fn publish(&self, records: &VecDeque<UploadRecord>, event: Event) {
        self.shared
            .snapshot_tx
            .send_replace(records.iter().cloned().collect());
        self.shared.event_tx.send(event).ok();
    }

    fn schedule_removal(&self, id: UploadId) {
        let delay = self.shared.completed_retention;
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                upload_id = %id,
                "no tokio runtime available, completed upload will not be removed automatically"
            );
            return;
        };

        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            // The registry may have been dropped in the meantime
            if let Some(shared) = shared.upgrade() {
                UploadRegistry { shared }.remove(&id);
            }
        });
    }
}
