//! Phase coordinator configuration

use edrr_domain::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Limits that bound recursive micro-cycle creation.
///
/// The granularity threshold mirrors the delimiting principles of the
/// methodology: a subtask that is already fine-grained enough, too
/// costly relative to its benefit, or of high enough quality does not
/// warrant another cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecursionLimits {
    /// Hard cap on nesting depth, independent of any score
    pub max_depth: usize,
    /// Subtasks with `granularity_score` below this stop recursing
    pub granularity_threshold: f64,
    /// Cost/benefit ratios above this stop recursing
    pub cost_benefit_ratio: f64,
    /// Subtasks already above this quality stop recursing
    pub quality_threshold: f64,
}

impl Default for RecursionLimits {
    fn default() -> Self {
        Self {
            max_depth: 3,
            granularity_threshold: 0.2,
            cost_benefit_ratio: 0.5,
            quality_threshold: 0.9,
        }
    }
}

/// Configuration surface consumed by the Phase Coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Whether phases advance automatically once gating allows it
    pub auto_transition: bool,
    /// Elapsed phase time after which progression proceeds even if the
    /// quality gate is unmet, preventing deadlock
    pub phase_transition_timeout: Duration,
    /// Per-phase quality gate; phases without an entry are ungated
    pub quality_thresholds: BTreeMap<Phase, f64>,
    /// Micro-cycle recursion bounds
    pub recursion: RecursionLimits,
    /// Project values scanned against task content for conflicts
    pub project_values: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            auto_transition: true,
            phase_transition_timeout: Duration::from_secs(3600),
            quality_thresholds: BTreeMap::new(),
            recursion: RecursionLimits::default(),
            project_values: Vec::new(),
        }
    }
}

impl CoordinatorConfig {
    // ==================== Builder Methods ====================

    pub fn with_auto_transition(mut self, enabled: bool) -> Self {
        self.auto_transition = enabled;
        self
    }

    pub fn with_phase_transition_timeout(mut self, timeout: Duration) -> Self {
        self.phase_transition_timeout = timeout;
        self
    }

    pub fn with_quality_threshold(mut self, phase: Phase, threshold: f64) -> Self {
        self.quality_thresholds.insert(phase, threshold);
        self
    }

    pub fn with_recursion(mut self, limits: RecursionLimits) -> Self {
        self.recursion = limits;
        self
    }

    pub fn with_project_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.project_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Quality gate for `phase`, if one is configured.
    pub fn quality_threshold(&self, phase: Phase) -> Option<f64> {
        self.quality_thresholds.get(&phase).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::default();
        assert!(config.auto_transition);
        assert_eq!(config.phase_transition_timeout, Duration::from_secs(3600));
        assert_eq!(config.recursion.max_depth, 3);
        assert!(config.quality_threshold(Phase::Expand).is_none());
    }

    #[test]
    fn test_builder() {
        let config = CoordinatorConfig::default()
            .with_auto_transition(false)
            .with_quality_threshold(Phase::Refine, 0.8)
            .with_project_values(["honesty"]);
        assert!(!config.auto_transition);
        assert_eq!(config.quality_threshold(Phase::Refine), Some(0.8));
        assert_eq!(config.project_values, vec!["honesty".to_string()]);
    }
}
