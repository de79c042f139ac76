//! Consensus-building records
//!
//! Consensus building runs in numbered rounds of preference collection
//! and adjustment. Round history is append-only and monotonically
//! numbered; `final_preferences` always reflects the most recent round.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-agent preference distribution over options
pub type Preferences = BTreeMap<String, BTreeMap<String, f64>>;

/// Status of a consensus-building run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStatus {
    /// Rounds still running
    InProgress,
    /// The threshold was met; a winner was declared
    Completed,
    /// Rounds exhausted; leading option adopted without full consensus
    PartialConsensus,
    /// Consensus could not be attempted; see explanation
    Failed,
}

/// One round of preference collection and adjustment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusRound {
    /// Round number (1-indexed, strictly increasing)
    pub round: usize,
    /// Preferences held by each agent at the start of the round
    pub preferences: Preferences,
    /// Adjustments applied toward the group mean during the round
    pub adjustments: Preferences,
    /// Discussion notes recorded during the round
    pub discussions: Vec<String>,
}

impl ConsensusRound {
    pub fn new(round: usize, preferences: Preferences) -> Self {
        Self {
            round,
            preferences,
            adjustments: Preferences::new(),
            discussions: Vec::new(),
        }
    }

    pub fn with_adjustments(mut self, adjustments: Preferences) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn note(&mut self, discussion: impl Into<String>) {
        self.discussions.push(discussion.into());
    }

    /// Mean support per option across all agents in this round.
    pub fn aggregate_support(&self) -> BTreeMap<String, f64> {
        aggregate(&self.preferences)
    }
}

/// Mean per-option support over a set of agent preferences.
pub fn aggregate(preferences: &Preferences) -> BTreeMap<String, f64> {
    let mut support = BTreeMap::new();
    if preferences.is_empty() {
        return support;
    }
    for prefs in preferences.values() {
        for (option, share) in prefs {
            *support.entry(option.clone()).or_insert(0.0) += share;
        }
    }
    let n = preferences.len() as f64;
    for share in support.values_mut() {
        *share /= n;
    }
    support
}

/// Outcome of a consensus-building run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// Unique record id
    pub id: String,
    /// When consensus building started
    pub timestamp: DateTime<Utc>,
    /// The task this decision belongs to
    pub task_id: String,
    /// The options under discussion
    pub options: Vec<String>,
    /// Current status
    pub status: ConsensusStatus,
    /// Winning option, when one was adopted
    pub result: Option<String>,
    /// Full round history, append-only
    pub rounds: Vec<ConsensusRound>,
    /// Preferences from the most recent round
    pub final_preferences: Preferences,
    /// Human-readable account of the outcome
    pub explanation: String,
}

impl ConsensusResult {
    pub fn new(task_id: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            task_id: task_id.into(),
            options,
            status: ConsensusStatus::InProgress,
            result: None,
            rounds: Vec::new(),
            final_preferences: Preferences::new(),
            explanation: String::new(),
        }
    }

    /// Build a failed result for a run that could not be attempted.
    pub fn failed(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut result = Self::new(task_id, Vec::new());
        result.status = ConsensusStatus::Failed;
        result.explanation = reason.into();
        result
    }

    /// Append a round, keeping `final_preferences` on the latest one.
    ///
    /// Rounds must arrive with strictly increasing numbers; a stale
    /// round is ignored rather than rewriting history.
    pub fn push_round(&mut self, round: ConsensusRound) {
        if let Some(last) = self.rounds.last() {
            if round.round <= last.round {
                return;
            }
        }
        self.final_preferences = if round.adjustments.is_empty() {
            round.preferences.clone()
        } else {
            round.adjustments.clone()
        };
        self.rounds.push(round);
    }

    /// Declare a winner with full consensus.
    pub fn complete(&mut self, winner: impl Into<String>, explanation: impl Into<String>) {
        self.result = Some(winner.into());
        self.explanation = explanation.into();
        self.status = ConsensusStatus::Completed;
    }

    /// Adopt the leading option without full consensus.
    pub fn settle_partial(&mut self, winner: impl Into<String>, explanation: impl Into<String>) {
        self.result = Some(winner.into());
        self.explanation = explanation.into();
        self.status = ConsensusStatus::PartialConsensus;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(entries: &[(&str, &[(&str, f64)])]) -> Preferences {
        entries
            .iter()
            .map(|(agent, shares)| {
                (
                    agent.to_string(),
                    shares
                        .iter()
                        .map(|(opt, share)| (opt.to_string(), *share))
                        .collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_aggregate_support() {
        let preferences = prefs(&[
            ("x", &[("a", 0.8), ("b", 0.2)]),
            ("y", &[("a", 0.4), ("b", 0.6)]),
        ]);
        let support = aggregate(&preferences);
        assert!((support["a"] - 0.6).abs() < 1e-9);
        assert!((support["b"] - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_round_history_monotonic() {
        let mut result = ConsensusResult::new("t1", vec!["a".to_string()]);
        result.push_round(ConsensusRound::new(1, prefs(&[("x", &[("a", 1.0)])])));
        result.push_round(ConsensusRound::new(2, prefs(&[("x", &[("a", 1.0)])])));
        // Stale round number is ignored
        result.push_round(ConsensusRound::new(2, Preferences::new()));
        assert_eq!(result.rounds.len(), 2);
        assert_eq!(result.rounds[1].round, 2);
    }

    #[test]
    fn test_final_preferences_track_latest_round() {
        let mut result = ConsensusResult::new("t1", vec!["a".to_string(), "b".to_string()]);
        let first = prefs(&[("x", &[("a", 1.0), ("b", 0.0)])]);
        let adjusted = prefs(&[("x", &[("a", 0.7), ("b", 0.3)])]);

        result.push_round(ConsensusRound::new(1, first.clone()).with_adjustments(adjusted.clone()));
        assert_eq!(result.final_preferences, adjusted);

        result.push_round(ConsensusRound::new(2, first.clone()));
        assert_eq!(result.final_preferences, first);
    }

    #[test]
    fn test_completion_states() {
        let mut result = ConsensusResult::new("t1", vec!["a".to_string()]);
        result.complete("a", "threshold met");
        assert_eq!(result.status, ConsensusStatus::Completed);
        assert_eq!(result.result.as_deref(), Some("a"));

        let mut partial = ConsensusResult::new("t2", vec!["a".to_string()]);
        partial.settle_partial("a", "rounds exhausted");
        assert_eq!(partial.status, ConsensusStatus::PartialConsensus);
    }
}
