//! Test fixtures: transports wired to mock servers and a recording alert channel

use std::sync::{Arc, Mutex};
use upload_tracker::{AlertChannel, Config, Severity, UploadRegistry, UploadTransport};

/// Alert channel that keeps every notification for later inspection
#[derive(Clone, Default)]
pub struct RecordingAlerts(Arc<Mutex<Vec<(String, Severity)>>>);

impl RecordingAlerts {
    /// Every notification received so far, oldest first
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.0.lock().unwrap().clone()
    }
}

impl AlertChannel for RecordingAlerts {
    fn notify(&self, message: &str, severity: Severity) {
        self.0.lock().unwrap().push((message.to_string(), severity));
    }
}

/// Config pointing at `base_url`, with small blocks so progress is reported often
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.server.base_url = base_url.to_string();
    config.tracking.progress_block_size = 1024;
    config
}

/// Transport, its registry, and the alerts it has raised
pub fn create_transport(config: Config) -> (UploadTransport, UploadRegistry, RecordingAlerts) {
    let registry = UploadRegistry::new(&config.tracking);
    let alerts = RecordingAlerts::default();
    let transport = UploadTransport::new(config, registry.clone(), Arc::new(alerts.clone()))
        .expect("test config is valid");
    (transport, registry, alerts)
}

/// Deterministic file contents of `len` bytes
pub fn file_contents(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
