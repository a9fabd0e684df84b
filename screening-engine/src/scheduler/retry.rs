// Retry Strategy - Exponential backoff with jitter for failed rescreenings

use crate::config::RetryConfig;
use crate::error::ScreeningError;
use chrono::Duration;
use rand::Rng;

/// What to do with a failed rescreening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the delay
    Retry {
        /// Delay before the retry
        delay: Duration,
    },
    /// Stop retrying and flag the schedule for manual attention
    GiveUp,
}

/// Bounded exponential backoff
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    config: RetryConfig,
}

impl RetryStrategy {
    /// Create strategy from configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Retries tolerated before giving up
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Delay before the retry that follows the `failures`-th consecutive failure (1-based)
    pub fn calculate_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_delay =
            self.config.initial_delay_secs as f64 * self.config.backoff_multiplier.powi(exponent);

        // Cap at max_delay
        let capped_delay = base_delay.min(self.config.max_delay_secs as f64);

        // Jitter only ever lengthens the delay
        let jitter = if self.config.jitter_factor > 0.0 {
            rand::thread_rng().gen_range(0.0..=self.config.jitter_factor)
        } else {
            0.0
        };
        let final_delay = capped_delay * (1.0 + jitter);

        Duration::milliseconds((final_delay * 1000.0) as i64)
    }

    /// Decide after the `failures`-th consecutive failure (1-based)
    pub fn decide(&self, failures: u32, error: &ScreeningError) -> RetryDecision {
        if !error.is_retryable() || failures > self.config.max_retries {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.calculate_delay(failures),
        }
    }
}
