//! User-visible failure notifications
//!
//! The transport reports upload failures to an [`AlertChannel`]. What the
//! channel does with them (toast, status bar, log line) is up to the
//! embedding application; the core never reads alert state back.

/// Alert severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Informational message
    Info,
    /// Something went wrong but the operation continued
    Warning,
    /// An operation failed
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Receiver of human-readable failure notifications
///
/// Notifications are fire-and-forget: implementations must not block and
/// cannot fail.
///
/// Any `Fn(&str, Severity)` closure is an alert channel:
///
/// ```
/// use upload_tracker::{AlertChannel, Severity};
///
/// let channel = |message: &str, severity: Severity| eprintln!("[{severity}] {message}");
/// channel.notify("disk full", Severity::Error);
/// ```
pub trait AlertChannel: Send + Sync {
    /// Deliver one notification
    fn notify(&self, message: &str, severity: Severity);
}

impl<F> AlertChannel for F
where
    F: Fn(&str, Severity) + Send + Sync,
{
    fn notify(&self, message: &str, severity: Severity) {
        self(message, severity)
    }
}

/// Alert channel that writes notifications to the `tracing` log
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAlertChannel;

impl AlertChannel for TracingAlertChannel {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => tracing::info!(alert = %message, "upload alert"),
            Severity::Warning => tracing::warn!(alert = %message, "upload alert"),
            Severity::Error => tracing::error!(alert = %message, "upload alert"),
        }
    }
}

/// Alert channel that drops every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpAlertChannel;

impl AlertChannel for NoOpAlertChannel {
    fn notify(&self, _message: &str, _severity: Severity) {}
}
