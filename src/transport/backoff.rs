//! Reconnect pacing: exponential backoff with random jitter.
//!
//! The deterministic part grows as `initial * multiplier^n`, capped at
//! `max_delay`. Every retry after the first adds a uniform jitter so that
//! many clients dropped at once do not come back in lockstep.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::{
    ConfigError, INITIAL_RECONNECT_DELAY_MS, MAX_RECONNECT_DELAY_MS, MAX_RECONNECT_JITTER_MS,
    RECONNECT_DELAY_MULTIPLIER,
};

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay of the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Growth factor per attempt.
    pub multiplier: f64,
    /// Cap on the deterministic part, in milliseconds.
    pub max_delay_ms: u64,
    /// Exclusive upper bound of the jitter, in milliseconds.
    pub max_jitter_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: INITIAL_RECONNECT_DELAY_MS,
            multiplier: RECONNECT_DELAY_MULTIPLIER,
            max_delay_ms: MAX_RECONNECT_DELAY_MS,
            max_jitter_ms: MAX_RECONNECT_JITTER_MS,
        }
    }
}

impl BackoffConfig {
    /// Check that the parameters describe a non-decreasing curve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                name: "multiplier",
                reason: format!("must be finite and >= 1.0, got {}", self.multiplier),
            });
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::Invalid {
                name: "max_delay_ms",
                reason: format!(
                    "{} is below the initial delay {}",
                    self.max_delay_ms, self.initial_delay_ms
                ),
            });
        }
        Ok(())
    }
}

/// Source of bounded random delays.
///
/// Not cryptographically secure, and does not need to be.
#[derive(Debug, Clone)]
pub struct JitterSource {
    rng: StdRng,
    max_jitter_ms: u64,
}

impl JitterSource {
    /// Create a jitter source bounded by `max_jitter_ms` (exclusive).
    pub fn new(max_jitter_ms: u64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            max_jitter_ms,
        }
    }

    /// Create a reproducible jitter source.
    pub fn with_seed(max_jitter_ms: u64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_jitter_ms,
        }
    }

    /// Next jitter value in `[0, max_jitter_ms)`; always 0 for a zero bound.
    pub fn jitter_ms(&mut self) -> u64 {
        if self.max_jitter_ms == 0 {
            return 0;
        }
        self.rng.gen_range(0..self.max_jitter_ms)
    }

    /// Exclusive upper bound.
    pub fn max_jitter_ms(&self) -> u64 {
        self.max_jitter_ms
    }
}

impl Default for JitterSource {
    fn default() -> Self {
        Self::new(MAX_RECONNECT_JITTER_MS)
    }
}

/// Exponential backoff with jitter.
///
/// The attempt counter belongs to the caller; calling [`delay_ms`] with the
/// same `n` yields the same deterministic component every time.
///
/// [`delay_ms`]: ExponentialBackoffStrategy::delay_ms
#[derive(Debug, Clone)]
pub struct ExponentialBackoffStrategy {
    initial_delay_ms: u64,
    multiplier: f64,
    max_delay_ms: u64,
    jitter: JitterSource,
}

impl ExponentialBackoffStrategy {
    /// Create a strategy with the default jitter bound.
    pub fn new(initial_delay_ms: u64, multiplier: f64, max_delay_ms: u64) -> Self {
        Self::with_jitter(
            initial_delay_ms,
            multiplier,
            max_delay_ms,
            JitterSource::default(),
        )
    }

    /// Create a strategy with an explicit jitter source.
    pub fn with_jitter(
        initial_delay_ms: u64,
        multiplier: f64,
        max_delay_ms: u64,
        jitter: JitterSource,
    ) -> Self {
        Self {
            initial_delay_ms,
            multiplier,
            max_delay_ms,
            jitter,
        }
    }

    /// Create a strategy from a config.
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::with_jitter(
            config.initial_delay_ms,
            config.multiplier,
            config.max_delay_ms,
            JitterSource::new(config.max_jitter_ms),
        )
    }

    /// Deterministic part of the delay for attempt `n`.
    pub fn base_delay_ms(&self, n: u32) -> u64 {
        if n == 0 {
            return self.initial_delay_ms;
        }
        let exponent = n.min(i32::MAX as u32) as i32;
        let grown = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        // Saturates for huge exponents (inf -> cap)
        grown.min(self.max_delay_ms as f64).round() as u64
    }

    /// Delay before retry attempt `n`, in milliseconds.
    ///
    /// Attempt 0 is the initial delay without jitter.
    pub fn delay_ms(&mut self, n: u32) -> u64 {
        if n == 0 {
            return self.initial_delay_ms;
        }
        self.base_delay_ms(n) + self.jitter.jitter_ms()
    }

    /// Delay before retry attempt `n`.
    pub fn delay(&mut self, n: u32) -> Duration {
        Duration::from_millis(self.delay_ms(n))
    }

    /// Exclusive upper bound of the jitter.
    pub fn max_jitter_ms(&self) -> u64 {
        self.jitter.max_jitter_ms()
    }
}

impl Default for ExponentialBackoffStrategy {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}
