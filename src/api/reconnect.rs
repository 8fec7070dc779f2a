//! Bounded exponential backoff for subscription sockets.

use crate::config::schema::SubscriptionConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts allowed before giving up
    pub retry_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            retry_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&SubscriptionConfig> for ReconnectPolicy {
    fn from(config: &SubscriptionConfig) -> Self {
        Self {
            retry_attempts: config.retry_attempts,
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `retry` (0-based): `min(initial * 2^retry, max)`
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn allows(&self, failures: u32) -> bool {
        failures <= self.retry_attempts
    }
}

/// Sleep for `delay`; `false` if cancelled first
pub async fn wait(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
