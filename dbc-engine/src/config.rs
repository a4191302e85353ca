//! Engine timing configuration.

use std::time::Duration;

/// Default create timeout.
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Default delete timeout.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Default wait between status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Lower bound for the wait between status fetches.
pub const DEFAULT_MIN_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Timeouts and poll cadence for one engine instance.
///
/// Each timeout bounds the total wall-clock time of a lifecycle call across
/// all of its polls, not a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub create_timeout: Duration,
    /// Falls back to `create_timeout` when unset.
    pub update_timeout: Option<Duration>,
    pub delete_timeout: Duration,
    pub poll_interval: Duration,
    pub min_poll_interval: Duration,
}

impl EngineConfig {
    pub fn update_timeout(&self) -> Duration {
        self.update_timeout.unwrap_or(self.create_timeout)
    }

    /// Effective sleep between fetches.
    pub fn poll_delay(&self) -> Duration {
        self.poll_interval.max(self.min_poll_interval)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_min_poll_interval(mut self, interval: Duration) -> Self {
        self.min_poll_interval = interval;
        self
    }

    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn with_update_timeout(mut self, timeout: Duration) -> Self {
        self.update_timeout = Some(timeout);
        self
    }

    pub fn with_delete_timeout(mut self, timeout: Duration) -> Self {
        self.delete_timeout = timeout;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            create_timeout: DEFAULT_CREATE_TIMEOUT,
            update_timeout: None,
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_poll_interval: DEFAULT_MIN_POLL_INTERVAL,
        }
    }
}
