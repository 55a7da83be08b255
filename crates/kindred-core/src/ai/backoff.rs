//! Exponential backoff with jitter for provider retries.

use std::time::Duration;

use kindred_types::config::OrchestratorConfig;
use kindred_types::llm::ProviderError;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_ms: u64,
    max_ms: u64,
}

impl BackoffPolicy {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms: max_ms.max(base_ms),
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.backoff_base_ms, config.backoff_max_ms)
    }

    /// Delay before retry number `retry` (zero-based), without jitter:
    /// `min(base * 2^retry, max)`.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.max_ms))
    }

    /// Delay before retry number `retry`, plus up to half again as jitter.
    ///
    /// A rate-limit hint from the provider raises the delay to at least the
    /// advertised wait, still capped at the policy maximum.
    pub fn delay_for(&self, retry: u32, error: &ProviderError) -> Duration {
        let base = self.base_delay(retry);
        let half = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = if half == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=half)
        };
        let delay = base + Duration::from_millis(jitter);

        match error {
            ProviderError::RateLimited {
                retry_after_ms: Some(ms),
            } => delay.max(Duration::from_millis((*ms).min(self.max_ms))),
            _ => delay,
        }
    }
}
