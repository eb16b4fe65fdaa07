//! Reconnect backoff

use rand::Rng;
use std::time::Duration;

/// Retry policy for connections that fail or close before the session starts
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Applied to the delay after each failed attempt
    pub multiplier: f64,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Give up after this many consecutive failures; `None` retries forever
    pub max_attempts: Option<u32>,
    /// Jitter factor in `0.0..=1.0`, applied as plus or minus
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            max_attempts: None,
            jitter: 0.25,
        }
    }
}

/// Consecutive-failure counter producing exponentially growing delays
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectConfig,
    attempts: u32,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        let current = config.initial_delay;
        Self {
            config,
            attempts: 0,
            current,
        }
    }

    /// Delay before the next attempt, `None` once attempts are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self
            .config
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
        {
            return None;
        }
        self.attempts += 1;

        let base = self.current;
        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let delay = if jitter > 0.0 {
            base.mul_f64(rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter)))
        } else {
            base
        };

        self.current = self
            .current
            .mul_f64(self.config.multiplier.max(1.0))
            .min(self.config.max_delay);

        Some(delay.min(self.config.max_delay))
    }

    /// Forget past failures once a session is up
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.current = self.config.initial_delay;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
