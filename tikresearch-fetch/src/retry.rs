//! Retry strategies for Research API requests.
//!
//! Two failure classes back off independently:
//!
//! - rate limiting (429): exponential, honoring the server's `Retry-After`
//! - server errors, timeouts and undecodable bodies: exponential with jitter

use rand::Rng;
use std::time::Duration;

/// Strategy for retrying one class of failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryStrategy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Whether to use exponential backoff.
    pub exponential_backoff: bool,
    /// Maximum delay between retries, server hints included.
    pub max_delay: Duration,
    /// Whether to randomize each delay.
    pub jitter: bool,
}

impl RetryStrategy {
    /// Creates a new retry strategy.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
            exponential_backoff: true,
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            exponential_backoff: false,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enables or disables exponential backoff.
    #[must_use]
    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Returns true if another retry is allowed after `retries` retries.
    pub fn allows(&self, retries: u32) -> bool {
        retries < self.max_retries
    }

    /// Calculates the un-jittered delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = if self.exponential_backoff {
            let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
            self.base_delay.saturating_mul(factor)
        } else {
            self.base_delay
        };

        delay.min(self.max_delay)
    }

    /// The delay to actually sleep before retry number `attempt`.
    ///
    /// A server hint wins over the computed backoff; both are capped at
    /// `max_delay`. With jitter, the computed delay is drawn uniformly from
    /// its upper half.
    pub fn next_delay(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        if let Some(hint) = server_hint {
            return hint.min(self.max_delay);
        }
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let half = delay / 2;
        let spread = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
        let extra = rand::thread_rng().gen_range(0..=spread);
        half + Duration::from_millis(extra)
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(3)
    }
}

// ============================================================================
// Retry Policy
// ============================================================================

/// Retry strategies per failure class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// HTTP 429 and `rate_limit_exceeded` bodies.
    pub rate_limit: RetryStrategy,
    /// HTTP 5xx, timeouts, connection failures and undecodable bodies.
    pub server_error: RetryStrategy,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            rate_limit: RetryStrategy::no_retry(),
            server_error: RetryStrategy::no_retry(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit: RetryStrategy::new(5)
                .with_base_delay(Duration::from_secs(30))
                .with_max_delay(Duration::from_secs(300)),
            server_error: RetryStrategy::new(3)
                .with_base_delay(Duration::from_millis(500))
                .with_max_delay(Duration::from_secs(30))
                .with_jitter(true),
        }
    }
}
