//! Reasoning loop control parameters

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static parameters controlling the reasoning loop.
///
/// These are application-layer loop controls, not domain policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopParams {
    /// Hard cap on iterations
    pub max_iterations: usize,
    /// Wall-clock budget checked before every iteration
    pub max_total: Duration,
    /// Retries granted for transient step failures before giving up
    pub retry_attempts: usize,
    /// Initial backoff wait; doubled after each transient failure
    pub initial_backoff: Duration,
    /// Seeds every randomness source the loop touches, for reproducible runs
    pub deterministic_seed: Option<u64>,
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_total: Duration::from_secs(300),
            retry_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            deterministic_seed: None,
        }
    }
}

impl LoopParams {
    // ==================== Builder Methods ====================

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_total(mut self, budget: Duration) -> Self {
        self.max_total = budget;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn with_deterministic_seed(mut self, seed: u64) -> Self {
        self.deterministic_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let params = LoopParams::default();
        assert_eq!(params.max_iterations, 10);
        assert_eq!(params.retry_attempts, 3);
        assert!(params.deterministic_seed.is_none());
    }

    #[test]
    fn test_builder() {
        let params = LoopParams::default()
            .with_max_iterations(2)
            .with_deterministic_seed(123);
        assert_eq!(params.max_iterations, 2);
        assert_eq!(params.deterministic_seed, Some(123));
    }
}
