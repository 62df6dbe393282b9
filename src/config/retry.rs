use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration for PingOne API calls.
///
/// Retries are bounded by a deadline rather than an attempt count: an operation
/// keeps retrying transient failures until its deadline elapses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Initial delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (percentage, 0.0-1.0).
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Per-operation deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Default per-operation deadline (10 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Deadline for credential type creation, where server-side provisioning is slower.
pub const CREDENTIAL_TYPE_CREATE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl RetryConfig {
    /// Deadline applied to operations that do not ask for their own.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// Calculate the delay for a given retry attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        // Add jitter
        let jitter_range = capped_delay * self.jitter;
        let jitter = if jitter_range > 0.0 {
            use rand::Rng;
            rand::thread_rng().gen_range(-jitter_range..jitter_range)
        } else {
            0.0
        };

        let final_delay = (capped_delay + jitter).max(0.0);
        Duration::from_millis(final_delay as u64)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "retry.backoff_multiplier must be at least 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!(
                "retry.jitter must be between 0.0 and 1.0, got {}",
                self.jitter
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(format!(
                "retry.initial_delay_ms ({}) must not exceed retry.max_delay_ms ({})",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }
        if self.default_timeout_secs == 0 {
            return Err("retry.default_timeout_secs must be greater than zero".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let config = no_jitter();
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_is_capped() {
        let config = no_jitter();
        assert_eq!(config.delay_for_attempt(10), Duration::from_millis(30_000));
        assert_eq!(config.delay_for_attempt(30), Duration::from_millis(30_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            jitter: 0.5,
            ..Default::default()
        };
        for _ in 0..100 {
            let delay = config.delay_for_attempt(0).as_millis();
            assert!((500..=1500).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_default_timeout_is_ten_minutes() {
        assert_eq!(RetryConfig::default().default_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(DEFAULT_TIMEOUT.as_secs(), 600);
        assert_eq!(CREDENTIAL_TYPE_CREATE_TIMEOUT.as_secs(), 900);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = RetryConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetryConfig {
            jitter: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RetryConfig {
            initial_delay_ms: 60_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(RetryConfig::default().validate().is_ok());
    }
}
