//! Core types for upload-tracker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counter backing [`UploadId::generate`]
static NEXT_UPLOAD_SEQ: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a tracked upload
///
/// Opaque to callers. Ids are built from a process-global monotonically
/// increasing counter and the creation time in milliseconds, so no id is ever
/// handed out twice within one process.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Allocate a fresh id
    pub(crate) fn generate() -> Self {
        let seq = NEXT_UPLOAD_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}-{}", seq, Utc::now().timestamp_millis()))
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UploadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UploadId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Upload status
///
/// Transitions only move forward:
/// `Pending → Uploading → Processing → Completed`, with `Error` reachable
/// from every non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Registered, no bytes sent yet
    Pending,
    /// Bytes are being handed to the network layer
    Uploading,
    /// All bytes sent; the server is still relaying the file to its storage
    Processing,
    /// Server accepted the file
    Completed,
    /// Failed, cancelled, or rejected by the server
    Error,
}

impl UploadStatus {
    /// Completed or Error; only terminal records may be removed by hand
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Error)
    }

    /// Pending, Uploading or Processing
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Position along the forward path, used to reject backward transitions
    fn rank(&self) -> u8 {
        match self {
            UploadStatus::Pending => 0,
            UploadStatus::Uploading => 1,
            UploadStatus::Processing => 2,
            UploadStatus::Completed | UploadStatus::Error => 3,
        }
    }

    /// Whether the state machine allows moving from `self` to `next`
    ///
    /// Staying in `Uploading` is allowed so progress updates can repeat;
    /// every other transition must strictly advance.
    pub fn can_transition_to(&self, next: UploadStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            UploadStatus::Pending => false,
            UploadStatus::Uploading => self.rank() <= 1,
            UploadStatus::Processing => self.rank() < 2,
            UploadStatus::Completed | UploadStatus::Error => true,
        }
    }

    /// Lowercase label, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracked state of one file transfer, as seen by observers of the registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Unique upload identifier
    pub id: UploadId,

    /// Display name of the uploaded file
    pub file_name: String,

    /// File size in bytes
    pub file_size: u64,

    /// Progress percentage (0 to 100)
    pub progress: u8,

    /// Current status
    pub status: UploadStatus,

    /// Failure description, present iff `status` is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// When the upload was registered
    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    pub(crate) fn new(id: UploadId, file_name: String, file_size: u64) -> Self {
        Self {
            id,
            file_name,
            file_size,
            progress: 0,
            status: UploadStatus::Pending,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Aggregate view over the registry
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadStats {
    /// Total number of tracked uploads
    pub total: usize,

    /// Registered but not started
    pub pending: usize,

    /// Currently sending bytes
    pub uploading: usize,

    /// Waiting for the server to finish
    pub processing: usize,

    /// Finished successfully and not yet removed
    pub completed: usize,

    /// Failed or cancelled and not yet removed
    pub failed: usize,

    /// Sum of file sizes of all tracked uploads (bytes)
    pub total_size_bytes: u64,

    /// Byte-weighted progress of active uploads (0.0 to 100.0, 0.0 when idle)
    pub overall_progress: f32,
}

/// Event emitted during the upload lifecycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Upload registered in the registry
    Created {
        /// Upload ID
        id: UploadId,
        /// File name
        file_name: String,
        /// File size in bytes
        file_size: u64,
    },

    /// Byte progress changed
    Progress {
        /// Upload ID
        id: UploadId,
        /// Progress percentage (0 to 100)
        percent: u8,
    },

    /// All bytes sent, waiting for the server's final answer
    Processing {
        /// Upload ID
        id: UploadId,
    },

    /// Server accepted the upload
    Completed {
        /// Upload ID
        id: UploadId,
    },

    /// Upload failed or was cancelled
    Failed {
        /// Upload ID
        id: UploadId,
        /// Error message shown to the user
        error: String,
    },

    /// Record removed from the registry
    Removed {
        /// Upload ID
        id: UploadId,
    },
}

impl Event {
    /// Id of the upload the event belongs to
    pub fn upload_id(&self) -> &UploadId {
        match self {
            Event::Created { id, .. }
            | Event::Progress { id, .. }
            | Event::Processing { id }
            | Event::Completed { id }
            | Event::Failed { id, .. }
            | Event::Removed { id } => id,
        }
    }
}
