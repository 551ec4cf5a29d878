//! # upload-tracker
//!
//! Client-side file upload tracking for storage backends.
//!
//! ## Design Philosophy
//!
//! upload-tracker keeps one live record per upload and moves it through a
//! fixed lifecycle: `pending`, `uploading`, `processing`, then `completed` or
//! `error`. Completed records disappear on their own after a short delay;
//! failed ones stay until the user dismisses them.
//!
//! - **Library-first** - No CLI or UI, renderers observe the registry
//! - **Event-driven** - Subscribe to lifecycle events or watch snapshots, no polling required
//! - **Pluggable alerts** - Failures are reported through an [`AlertChannel`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use upload_tracker::{Config, TracingAlertChannel, UploadRegistry, UploadRequest, UploadTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.server.base_url = "https://storage.example.com/api".to_string();
//!
//!     let registry = UploadRegistry::new(&config.tracking);
//!     let transport = UploadTransport::new(config, registry.clone(), Arc::new(TracingAlertChannel))?;
//!
//!     // Subscribe to events
//!     let mut events = registry.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let handle = transport.spawn(UploadRequest::new("files/upload", "hello.txt", "hello"));
//!     handle.join().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// User-facing failure notifications
pub mod alert;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Live collection of tracked uploads
pub mod registry;
/// HTTP upload transport
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use alert::{AlertChannel, NoOpAlertChannel, Severity, TracingAlertChannel};
pub use config::{AUTO_REMOVE_DELAY, Config, ServerConfig, TrackingConfig};
pub use error::{Error, Result};
pub use registry::UploadRegistry;
pub use transport::{UploadHandle, UploadPayload, UploadRequest, UploadTarget, UploadTransport};
pub use types::{Event, UploadId, UploadRecord, UploadStats, UploadStatus};

pub use tokio_util::sync::CancellationToken;
