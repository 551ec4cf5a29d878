//! Custom test assertions for upload integration tests

use std::time::Duration;
use upload_tracker::{UploadId, UploadRecord, UploadRegistry, UploadStatus};

/// Result of waiting for an upload to settle
#[derive(Debug)]
pub enum WaitResult {
    /// Upload completed successfully
    Completed,
    /// Upload failed with error
    Failed(String),
    /// Timeout waiting for a terminal state
    Timeout,
    /// Record disappeared before it could be observed in a terminal state
    Removed,
}

/// Wait until the record for `id` reaches `Completed` or `Error`
///
/// Watches registry snapshots, so a terminal state reached before the call is
/// still observed.
pub async fn wait_for_terminal(
    registry: &UploadRegistry,
    id: &UploadId,
    timeout: Duration,
) -> WaitResult {
    let mut watcher = registry.watch();

    let result = tokio::time::timeout(timeout, async {
        loop {
            let record = watcher
                .borrow_and_update()
                .iter()
                .find(|r| &r.id == id)
                .cloned();
            match record {
                Some(r) if r.status == UploadStatus::Completed => return WaitResult::Completed,
                Some(r) if r.status == UploadStatus::Error => {
                    return WaitResult::Failed(r.error_message.unwrap_or_default());
                }
                Some(_) => {}
                None => return WaitResult::Removed,
            }
            if watcher.changed().await.is_err() {
                return WaitResult::Removed;
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Wait until the record for `id` has the given status
pub async fn wait_for_status(
    registry: &UploadRegistry,
    id: &UploadId,
    status: UploadStatus,
    timeout: Duration,
) -> bool {
    let mut watcher = registry.watch();

    let result = tokio::time::timeout(timeout, async {
        loop {
            if watcher
                .borrow_and_update()
                .iter()
                .any(|r| &r.id == id && r.status == status)
            {
                return true;
            }
            if watcher.changed().await.is_err() {
                return false;
            }
        }
    })
    .await;

    result.unwrap_or(false)
}

/// Assert that a record is in the expected terminal state
pub fn assert_record(record: &UploadRecord, status: UploadStatus, error: Option<&str>) {
    assert_eq!(
        record.status, status,
        "upload {} ({}) has unexpected status",
        record.id, record.file_name
    );
    assert_eq!(
        record.error_message.as_deref(),
        error,
        "upload {} ({}) has unexpected error message",
        record.id,
        record.file_name
    );
}
