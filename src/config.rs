//! Configuration types for upload-tracker

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Delay after which a completed upload disappears from the registry
pub const AUTO_REMOVE_DELAY: Duration = Duration::from_millis(3000);

/// Backend connection settings
///
/// Groups settings related to where uploads are sent and how requests are
/// authenticated. Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL that relative upload destinations are joined to
    /// (default: "http://localhost:8000/api")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token sent as `Authorization: Bearer <token>` when an upload does not
    /// carry its own token
    #[serde(default)]
    pub auth_token: Option<String>,

    /// User-Agent header for upload requests (default: "upload-tracker/<version>")
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            user_agent: default_user_agent(),
        }
    }
}

/// Registry and progress reporting settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// How long a completed upload stays visible before it is removed
    /// (default: 3000 ms, serialized as milliseconds)
    #[serde(default = "default_completed_retention", with = "duration_millis_serde")]
    pub completed_retention: Duration,

    /// Size of the chunks the file body is streamed in (default: 64 KiB)
    ///
    /// Progress is reported once per chunk, so smaller chunks give smoother
    /// progress at the cost of more registry updates.
    #[serde(default = "default_progress_block_size")]
    pub progress_block_size: usize,

    /// Capacity of the lifecycle event broadcast channel (default: 1000)
    ///
    /// Slow subscribers that fall further behind than this lose the oldest
    /// events; snapshot watchers are unaffected.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            completed_retention: default_completed_retention(),
            progress_block_size: default_progress_block_size(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Main configuration for upload-tracker
///
/// Sub-config fields are flattened, so the JSON form has no nesting:
///
/// ```json
/// {
///   "base_url": "https://files.example.com/api",
///   "auth_token": "secret",
///   "completed_retention": 3000
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection settings
    #[serde(flatten)]
    pub server: ServerConfig,

    /// Registry and progress reporting settings
    #[serde(flatten)]
    pub tracking: TrackingConfig,
}

impl Config {
    /// Load configuration from a JSON file, applying defaults for missing fields
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server.base_url).map_err(|e| Error::Config {
            message: format!("invalid base_url '{}': {}", self.server.base_url, e),
            key: Some("base_url".to_string()),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("base_url must use http or https, got '{}'", url.scheme()),
                key: Some("base_url".to_string()),
            });
        }
        if self.tracking.progress_block_size == 0 {
            return Err(Error::Config {
                message: "progress_block_size must be greater than zero".to_string(),
                key: Some("progress_block_size".to_string()),
            });
        }
        if self.tracking.event_channel_capacity == 0 {
            return Err(Error::Config {
                message: "event_channel_capacity must be greater than zero".to_string(),
                key: Some("event_channel_capacity".to_string()),
            });
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_user_agent() -> String {
    format!("upload-tracker/{}", env!("CARGO_PKG_VERSION"))
}

fn default_completed_retention() -> Duration {
    AUTO_REMOVE_DELAY
}

fn default_progress_block_size() -> usize {
    64 * 1024
}

fn default_event_channel_capacity() -> usize {
    1000
}

// Duration <-> integer milliseconds
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
