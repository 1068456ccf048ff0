use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

/// Knobs for a [`RegionOrchestrator`](super::RegionOrchestrator).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum provider fetches in flight at once (the worker pool size).
    pub max_concurrency: usize,
    /// Upper bound on a single provider fetch. A fetch that runs longer is
    /// abandoned and reported as a fetch error.
    pub fetch_timeout: Duration,
    /// How long shutdown waits for outstanding notification deliveries.
    pub notification_drain_timeout: Duration,
}

impl OrchestratorConfig {
    /// Worker pool size used when nothing is configured.
    pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
    /// Per-fetch timeout used when nothing is configured.
    pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
    /// Shutdown drain window used when nothing is configured.
    pub const DEFAULT_NOTIFICATION_DRAIN_TIMEOUT: Duration =
        Duration::from_secs(10);

    /// Replace the worker pool size.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Replace the per-fetch timeout.
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    /// Pool size actually used. Zero would admit nothing and the semaphore
    /// refuses anything above `MAX_PERMITS`.
    pub(crate) fn permits(&self) -> usize {
        self.max_concurrency.clamp(1, Semaphore::MAX_PERMITS)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Self::DEFAULT_MAX_CONCURRENCY,
            fetch_timeout: Self::DEFAULT_FETCH_TIMEOUT,
            notification_drain_timeout:
                Self::DEFAULT_NOTIFICATION_DRAIN_TIMEOUT,
        }
    }
}
