// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry backoff policy.
//!
//! Used by the workflow engine between attempts of the same turn. The
//! jitter unit is injected by the caller so core stays free of RNG
//! dependencies and tests stay deterministic.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with proportional jitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Multiplier applied per additional attempt.
    pub factor: f64,
    /// Upper bound on the computed delay (pre-jitter).
    pub cap: Duration,
    /// Jitter fraction; 0.2 means the delay varies by up to ±20 %.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            factor: 2.0,
            cap: Duration::from_secs(60),
            jitter: 0.2,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let scaled = self.base.as_secs_f64() * self.factor.powi(exp as i32);
        Duration::from_secs_f64(scaled.min(self.cap.as_secs_f64()))
    }

    /// Delay with jitter applied; `unit` must lie in `[-1.0, 1.0]` and
    /// scales the jitter fraction.
    pub fn jittered(&self, attempt: u32, unit: f64) -> Duration {
        let unit = unit.clamp(-1.0, 1.0);
        let base = self.delay(attempt).as_secs_f64();
        let jittered = base * (1.0 + self.jitter * unit);
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
