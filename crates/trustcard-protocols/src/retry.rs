//! Bounded polling for writes that need time to reach the indexer.

use std::future::Future;
use std::time::Duration;

use tracing::trace;

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of probes, including the first.
    pub max_attempts: u32,
    /// Pause between two probes.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(1200),
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Same attempts, no waiting. For tests and local networks.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Set the number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the delay between attempts.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Probe until it yields a value or attempts run out.
    ///
    /// `probe` receives the 1-based attempt number. Returns `Ok(None)` when
    /// every attempt came back empty; probe errors abort immediately.
    pub async fn poll<T, E, F, Fut>(&self, mut probe: F) -> Result<Option<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(found) = probe(attempt).await? {
                return Ok(Some(found));
            }
            trace!(attempt, max_attempts = self.max_attempts, "Probe came back empty");
            if attempt < self.max_attempts && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        Ok(None)
    }
}
