//! Configuration for the sync coordinator.

use std::time::Duration;

/// Configuration shared by both stations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Store URL.
    pub server_url: String,
    /// Time between polls.
    pub poll_interval: Duration,
    /// Request timeout passed to HTTP clients.
    pub timeout: Duration,
}

impl SyncConfig {
    /// Default time between polls.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

    /// Creates a new sync configuration.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:5000")
    }
}
