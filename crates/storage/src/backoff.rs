//! Exponential backoff with a capped delay, a bounded attempt count and an
//! optional deadline on the total time spent waiting.
//!
//! The policy only computes delays; waiting goes through a [`Sleeper`] so
//! tests can run retry loops without real time passing.

use std::time::Duration;

use async_trait::async_trait;

use rota_core::config::RetryConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub deadline: Option<Duration>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            multiplier: cfg.multiplier,
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            max_attempts: cfg.max_retries.max(1),
            deadline: cfg.deadline_secs.map(Duration::from_secs),
        }
    }
}

impl BackoffPolicy {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// A fresh schedule for one retry loop.
    pub fn schedule(&self) -> BackoffSchedule {
        BackoffSchedule {
            policy: self.clone(),
            failures: 0,
            next_delay: self.initial_delay.min(self.max_delay),
            waited: Duration::ZERO,
        }
    }
}

/// Per-loop state: how many attempts failed and how long we already waited.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    policy: BackoffPolicy,
    failures: u32,
    next_delay: Duration,
    waited: Duration,
}

impl BackoffSchedule {
    /// Record a failed attempt and return how long to wait before the next
    /// one, or `None` once the attempt budget or the deadline is used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.failures += 1;
        if self.failures >= self.policy.max_attempts {
            return None;
        }
        let delay = self.next_delay;
        if let Some(deadline) = self.policy.deadline {
            if self.waited + delay > deadline {
                return None;
            }
        }
        self.waited += delay;
        // Saturate at the cap instead of overflowing Duration.
        let grown = Duration::try_from_secs_f64(delay.as_secs_f64() * self.policy.multiplier)
            .unwrap_or(self.policy.max_delay);
        self.next_delay = grown.min(self.policy.max_delay);
        Some(delay)
    }

    /// Attempts made so far (failed ones).
    pub fn attempts(&self) -> u32 {
        self.failures
    }

    pub fn waited(&self) -> Duration {
        self.waited
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeping on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
