//! HTTP upload transport.
//!
//! [`UploadTransport`] performs uploads and drives each upload's record
//! through the registry state machine:
//! - [`progress`] - progress-tracked request body
//! - [`request`] - request and multipart payload construction
//!
//! For every upload exactly one terminal transition happens (`Completed` or
//! `Error`) and the alert channel hears about it at most once: never on
//! success or cancellation, once on server or network failure. This holds even
//! when the upload future is dropped before it finishes.

mod progress;
mod request;


pub use request::{FILE_FIELD, PATH_FIELD, UploadPayload, UploadRequest, UploadTarget};

use crate::alert::{AlertChannel, Severity};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::UploadRegistry;
use crate::types::{UploadId, UploadRecord};
use progress::ProgressReporter;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Record message for uploads that never got a response
pub const NETWORK_ERROR_MESSAGE: &str = "network error";

/// Record message for uploads cancelled by the caller
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Record message for uploads whose task panicked
pub const TASK_FAILED_MESSAGE: &str = "upload task failed";

/// What the network exchange produced, before it is applied to the registry
enum Outcome {
    Response { status: StatusCode, body: String },
    Failed(Error),
    Cancelled,
}

/// Uploads files and reports their lifecycle to an [`UploadRegistry`]
/// (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct UploadTransport {
    /// Shared HTTP client (connection pool reused across uploads)
    client: reqwest::Client,
    /// Configuration (wrapped in Arc for sharing across tasks)
    config: Arc<Config>,
    /// Registry every upload is tracked in
    registry: UploadRegistry,
    /// Where failures are reported
    alerts: Arc<dyn AlertChannel>,
}

impl std::fmt::Debug for UploadTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadTransport")
            .field("base_url", &self.config.server.base_url)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl UploadTransport {
    /// Create a transport that tracks uploads in `registry` and reports
    /// failures to `alerts`
    ///
    /// No request timeout is configured: an upload runs until the server
    /// answers, the connection fails, or the caller cancels it.
    pub fn new(
        config: Config,
        registry: UploadRegistry,
        alerts: Arc<dyn AlertChannel>,
    ) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .user_agent(config.server.user_agent.clone())
            .build()
            .map_err(|e| Error::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: Arc::new(config),
            registry,
            alerts,
        })
    }

    /// Registry the transport reports to
    pub fn registry(&self) -> &UploadRegistry {
        &self.registry
    }

    /// Upload a file and wait for the server's answer
    ///
    /// A record is registered before anything is sent. A successful response
    /// resolves to its JSON body deserialized as `T`, or `None` if the body is
    /// empty or not valid JSON for `T`.
    ///
    /// # Errors
    ///
    /// - [`Error::Server`] if the server answered with a non-success status
    /// - [`Error::Network`] if no response could be obtained
    /// - [`Error::Cancelled`] if `cancel` fired first
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use upload_tracker::*;
    /// # use std::sync::Arc;
    /// # async fn example() -> Result<()> {
    /// let registry = UploadRegistry::default();
    /// let transport = UploadTransport::new(
    ///     Config::default(),
    ///     registry.clone(),
    ///     Arc::new(TracingAlertChannel),
    /// )?;
    ///
    /// let request =
    ///     UploadRequest::new("files/upload", "notes.txt", "hello").with_auth_token("secret");
    /// let reply: Option<serde_json::Value> = transport
    ///     .upload(request, CancellationToken::new())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn upload<T>(
        &self,
        request: UploadRequest,
        cancel: CancellationToken,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let id = self
            .registry
            .create(request.file_name.clone(), request.file_size());
        self.run(id, request, cancel).await
    }

    /// Start an upload on a background task
    ///
    /// The record exists by the time this returns. Dropping the handle does
    /// not stop the upload; call [`UploadHandle::cancel`] for that.
    pub fn spawn(&self, request: UploadRequest) -> UploadHandle {
        let id = self
            .registry
            .create(request.file_name.clone(), request.file_size());
        let cancel = CancellationToken::new();

        let transport = self.clone();
        let task_id = id.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            transport
                .run::<serde_json::Value>(task_id, request, task_cancel)
                .await
        });

        UploadHandle {
            id,
            cancel,
            transport: self.clone(),
            task,
        }
    }

    async fn run<T>(
        &self,
        id: UploadId,
        request: UploadRequest,
        cancel: CancellationToken,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let guard = SettleGuard::new(self, &id);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::Cancelled,
            outcome = self.exchange(&id, request) => outcome,
        };
        guard.disarm();
        self.settle(&id, outcome)
    }

    /// Send the request and read the final response.
    /// Dropping this future aborts the request.
    async fn exchange(&self, id: &UploadId, request: UploadRequest) -> Outcome {
        let file_size = request.file_size();
        let UploadRequest {
            destination,
            auth_token,
            payload,
            file_name,
        } = request;

        let url = match self.resolve_url(&destination) {
            Ok(url) => url,
            Err(e) => return Outcome::Failed(e),
        };

        let reporter = ProgressReporter::new(self.registry.clone(), id.clone(), file_size);
        let block_size = self.config.tracking.progress_block_size;
        let form = match payload.into_form(&file_name, block_size, reporter) {
            Ok(form) => form,
            Err(e) => return Outcome::Failed(e),
        };

        let mut builder = self.client.post(url.clone()).multipart(form);
        let token = auth_token
            .as_deref()
            .or(self.config.server.auth_token.as_deref());
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }

        tracing::info!(
            upload_id = %id,
            file_name = %file_name,
            file_size,
            url = %url,
            "starting upload"
        );

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return Outcome::Failed(Error::Network(e)),
        };
        let status = response.status();
        match response.text().await {
            Ok(body) => Outcome::Response { status, body },
            Err(e) => Outcome::Failed(Error::Network(e)),
        }
    }

    /// Apply the outcome to the registry and the alert channel
    fn settle<T>(&self, id: &UploadId, outcome: Outcome) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match outcome {
            Outcome::Response { status, body } if status.is_success() => {
                self.registry.mark_completed(id);
                tracing::info!(upload_id = %id, status = status.as_u16(), "upload completed");
                match serde_json::from_str::<T>(&body) {
                    Ok(value) => Ok(Some(value)),
                    Err(e) => {
                        tracing::debug!(
                            upload_id = %id,
                            error = %e,
                            "success response has no usable JSON body"
                        );
                        Ok(None)
                    }
                }
            }
            Outcome::Response { status, body } => {
                let message = server_failure_message(status, &body);
                tracing::warn!(
                    upload_id = %id,
                    status = status.as_u16(),
                    error = %message,
                    "upload rejected by server"
                );
                self.fail(id, &message);
                Err(Error::Server {
                    status: status.as_u16(),
                    body,
                })
            }
            Outcome::Failed(err @ Error::Network(_)) => {
                tracing::warn!(upload_id = %id, error = %err, "upload failed without a response");
                self.fail(id, NETWORK_ERROR_MESSAGE);
                Err(err)
            }
            Outcome::Failed(err) => {
                tracing::warn!(upload_id = %id, error = %err, "upload could not be started");
                self.fail(id, &err.to_string());
                Err(err)
            }
            Outcome::Cancelled => {
                tracing::info!(upload_id = %id, "upload cancelled");
                self.registry.mark_failed(id, CANCELLED_MESSAGE);
                Err(Error::Cancelled)
            }
        }
    }

    /// Fail the record and alert, unless it had already settled
    fn fail(&self, id: &UploadId, message: &str) {
        if self.registry.mark_failed(id, message) {
            self.alerts.notify(message, Severity::Error);
        }
    }

    /// Absolute destinations are used as-is, anything else is joined to the base URL
    fn resolve_url(&self, destination: &str) -> Result<url::Url> {
        let destination = destination.trim();
        if destination.starts_with("http://") || destination.starts_with("https://") {
            return url::Url::parse(destination)
                .map_err(|e| Error::InvalidDestination(format!("{destination}: {e}")));
        }

        let joined = format!(
            "{}/{}",
            self.config.server.base_url.trim_end_matches('/'),
            destination.trim_start_matches('/')
        );
        url::Url::parse(&joined).map_err(|e| Error::InvalidDestination(format!("{joined}: {e}")))
    }
}

/// Plain-text body of a failed response, or a status line if the body is empty
fn server_failure_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("upload failed with status {status}")
    } else {
        body.to_string()
    }
}

/// Fails a record whose upload stopped before its outcome was applied
///
/// Armed while the exchange is in flight. If the future is dropped (timeout,
/// `select!`, aborted task) the record is failed as cancelled, without an
/// alert. If the task is unwinding from a panic it is failed and alerted.
struct SettleGuard<'a> {
    transport: &'a UploadTransport,
    id: &'a UploadId,
    armed: bool,
}

impl<'a> SettleGuard<'a> {
    fn new(transport: &'a UploadTransport, id: &'a UploadId) -> Self {
        Self {
            transport,
            id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if std::thread::panicking() {
            tracing::error!(upload_id = %self.id, "upload panicked before it settled");
            self.transport.fail(self.id, TASK_FAILED_MESSAGE);
        } else if self
            .transport
            .registry
            .mark_failed(self.id, CANCELLED_MESSAGE)
        {
            tracing::info!(upload_id = %self.id, "upload dropped before it settled");
        }
    }
}

/// Handle to an upload started with [`UploadTransport::spawn`]
///
/// Progress is observed through the registry; the final result through
/// [`UploadHandle::join`].
#[derive(Debug)]
pub struct UploadHandle {
    id: UploadId,
    cancel: CancellationToken,
    transport: UploadTransport,
    task: tokio::task::JoinHandle<Result<Option<serde_json::Value>>>,
}

impl UploadHandle {
    /// Id of the upload's record
    pub fn id(&self) -> &UploadId {
        &self.id
    }

    /// Cancel the upload; the record ends in `Error` with message "cancelled"
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this upload
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current copy of the upload's record, `None` once it has been removed
    pub fn record(&self) -> Option<UploadRecord> {
        self.transport.registry.get(&self.id)
    }

    /// Whether the upload has finished
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the upload's final result
    pub async fn join(self) -> Result<Option<serde_json::Value>> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(upload_id = %self.id, error = %e, "upload task did not finish");
                // no-op if the task already settled the record on its way out
                self.transport.fail(&self.id, TASK_FAILED_MESSAGE);
                Err(Error::Other(format!("{TASK_FAILED_MESSAGE}: {e}")))
            }
        }
    }
}
