//! Bounded exponential backoff for rebuilding a lost stream connection.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reconnect policy for the change stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Reconnect attempts before the ingestor gives up (default: 10)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first attempt (default: 500ms)
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on any single delay (default: 30s)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between attempts (default: 2.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Fraction of each delay added as random jitter (default: 0.2)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_retries() -> u32 {
    10
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl BackoffPolicy {
    /// Policy that never reconnects
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Un-jittered delay before reconnect attempt `attempt` (1-based)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let millis = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }

    /// Delay before reconnect attempt `attempt`, with jitter applied
    pub fn delay(&self, attempt: u32) -> Duration {
        self.jittered(attempt, &mut rand::thread_rng())
    }

    /// Delay with jitter drawn from `rng`
    pub fn jittered<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        let spread = self.jitter.clamp(0.0, 1.0);
        if spread == 0.0 {
            return base;
        }
        base + base.mul_f64(rng.gen_range(0.0..=spread))
    }
}
