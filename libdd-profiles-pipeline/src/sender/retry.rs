// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Backoff settings of a [`super::Sender`].
///
/// The delay before retry `n` (counting from 0) is
/// `min(max_backoff, base_backoff * 2^n)`, moved up or down by a uniformly
/// random amount of at most `jitter_fraction` of itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub(crate) max_retries: u32,
    pub(crate) base_backoff: Duration,
    pub(crate) max_backoff: Duration,
    pub(crate) jitter_fraction: f64,
}

impl RetryConfig {
    /// Create a new retry config with defaults: 5 retries, 100ms base delay
    /// capped at 5s, 20% jitter.
    pub fn new() -> Self {
        Self {
            max_retries: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            jitter_fraction: 0.2,
        }
    }

    /// Set the maximum number of retry attempts (not counting the initial
    /// request).
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base_backoff(mut self, delay: Duration) -> Self {
        self.base_backoff = delay;
        self
    }

    pub fn max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Clamped to `[0, 1]`; 0 disables jitter.
    pub fn jitter_fraction(mut self, fraction: f64) -> Self {
        self.jitter_fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self
    }

    pub fn get_max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Calculate the delay before the given retry (0-indexed).
    pub(crate) fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponential = self
            .base_backoff
            .saturating_mul(2u32.saturating_pow(retry))
            .min(self.max_backoff);
        let spread = exponential.as_secs_f64() * self.jitter_fraction;
        if spread == 0.0 {
            return exponential;
        }
        let offset = Duration::from_secs_f64(fastrand::f64() * spread);
        if fastrand::bool() {
            exponential.saturating_add(offset)
        } else {
            exponential.saturating_sub(offset)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a response status is worth retrying: server errors, request
/// timeouts and rate limiting.
pub fn is_retryable_status(status: u16) -> bool {
    (500..600).contains(&status) || status == 408 || status == 429
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = RetryConfig::new();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_backoff, Duration::from_millis(100));
        assert_eq!(config.max_backoff, Duration::from_secs(5));
    }

    #[test]
    fn exponential_backoff_without_jitter() {
        let config = RetryConfig::new()
            .base_backoff(Duration::from_millis(100))
            .max_backoff(Duration::from_millis(700))
            .jitter_fraction(0.0);
        assert_eq!(config.delay_for_retry(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_retry(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_retry(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_retry(3), Duration::from_millis(700));
        assert_eq!(config.delay_for_retry(40), Duration::from_millis(700));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = RetryConfig::new()
            .base_backoff(Duration::from_millis(100))
            .jitter_fraction(0.2);
        for _ in 0..100 {
            let delay = config.delay_for_retry(0);
            assert!(delay >= Duration::from_millis(80), "{delay:?}");
            assert!(delay <= Duration::from_millis(120), "{delay:?}");
        }
    }

    #[test]
    fn jitter_fraction_is_clamped() {
        assert_eq!(RetryConfig::new().jitter_fraction(3.0).jitter_fraction, 1.0);
        assert_eq!(RetryConfig::new().jitter_fraction(-1.0).jitter_fraction, 0.0);
        assert_eq!(
            RetryConfig::new().jitter_fraction(f64::NAN).jitter_fraction,
            0.0
        );
    }

    #[test]
    fn retryable_statuses() {
        for status in [500, 502, 503, 504, 599, 408, 429] {
            assert!(is_retryable_status(status), "{status}");
        }
        for status in [200, 204, 301, 400, 401, 403, 404, 413, 600] {
            assert!(!is_retryable_status(status), "{status}");
        }
    }
}
