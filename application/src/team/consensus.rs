//! Consensus building over agent preference distributions
//!
//! Preferences start from expertise matching (seeded random for agents
//! with no match) and move toward the group mean by a fixed factor each
//! round. A run completes as soon as the leading option's mean support
//! reaches the task's threshold; exhausting the round limit adopts the
//! leading option as a partial consensus rather than failing.

use super::{ConsensusBuilder, DecisionEngine, Voter};
use edrr_domain::decision::consensus::aggregate;
use edrr_domain::{
    ConsensusResult, ConsensusRound, ConsensusStatus, Preferences, Task, VoteStatus,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// How far each agent moves toward the group mean per round.
const ADJUSTMENT_FACTOR: f64 = 0.2;

/// Outcome of a single-shot consensus vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusVote {
    pub status: ConsensusStatus,
    /// Adopted option, when one was reached
    pub decision: Option<String>,
    /// Share of agents backing the decision, in `[0, 1]`
    pub confidence: f64,
    pub explanation: String,
}

impl ConsensusBuilder for DecisionEngine {
    fn build_consensus(&mut self, task: &Task) -> ConsensusResult {
        if self.agents().is_empty() {
            return ConsensusResult::failed(&task.id, "no agents available for consensus");
        }
        if task.options.is_empty() {
            return ConsensusResult::failed(&task.id, "no options provided for consensus");
        }

        let params = task.consensus_params();
        let mut result = ConsensusResult::new(&task.id, task.options.clone());
        let mut current = self.initial_preferences(task);

        for number in 1..=params.max_rounds {
            let mut round = ConsensusRound::new(number, current.clone());
            let support = round.aggregate_support();
            let Some((leader, share)) = leading(&support) else {
                break;
            };
            round.note(format!(
                "round {number}: '{leader}' leads with {share:.2} mean support"
            ));
            debug!(round = number, leader = %leader, share, "consensus round");

            if share >= params.threshold {
                result.push_round(round);
                result.complete(
                    &leader,
                    format!(
                        "'{leader}' reached {share:.2} mean support (threshold {:.2}) in round {number}",
                        params.threshold
                    ),
                );
                info!(task_id = %task.id, result = %leader, "consensus reached");
                return result;
            }

            let adjusted = adjust_toward_mean(&current, &support);
            result.push_round(round.with_adjustments(adjusted.clone()));
            current = adjusted;
        }

        let support = aggregate(&current);
        if let Some((leader, share)) = leading(&support) {
            result.settle_partial(
                &leader,
                format!(
                    "threshold {:.2} not reached after {} rounds; adopting '{leader}' at {share:.2} support",
                    params.threshold, params.max_rounds
                ),
            );
            info!(task_id = %task.id, result = %leader, "partial consensus adopted");
        }
        result
    }

    fn consensus_vote(&mut self, task: &Task) -> ConsensusVote {
        let mut majority_task = task.clone();
        majority_task.voting_method = Some("majority".to_string());
        let record = self.vote_on_critical_decision(&majority_task);

        match (record.status, record.result) {
            (VoteStatus::Completed, Some(decision)) => {
                let total = record.votes.len().max(1);
                let backing = record
                    .votes
                    .values()
                    .filter(|vote| **vote == decision)
                    .count();
                ConsensusVote {
                    status: ConsensusStatus::Completed,
                    decision: Some(decision),
                    confidence: backing as f64 / total as f64,
                    explanation: record.explanation,
                }
            }
            _ => ConsensusVote {
                status: ConsensusStatus::Failed,
                decision: None,
                confidence: 0.0,
                explanation: record.explanation,
            },
        }
    }
}

impl DecisionEngine {
    /// Initial per-agent preference distributions over the options.
    ///
    /// Expertise scores are normalized into shares; an agent matching
    /// nothing gets a seeded random distribution so runs stay
    /// reproducible under a fixed seed.
    fn initial_preferences(&mut self, task: &Task) -> Preferences {
        let agents: Vec<(String, Vec<usize>)> = self
            .agents()
            .iter()
            .map(|agent| {
                let scores = task
                    .options
                    .iter()
                    .map(|option| agent.expertise_matches(option))
                    .collect();
                (agent.name.clone(), scores)
            })
            .collect();

        let mut preferences = Preferences::new();
        for (name, scores) in agents {
            let total: usize = scores.iter().sum();
            let shares: BTreeMap<String, f64> = if total > 0 {
                task.options
                    .iter()
                    .zip(&scores)
                    .map(|(option, score)| (option.clone(), *score as f64 / total as f64))
                    .collect()
            } else {
                let raw: Vec<f64> = task
                    .options
                    .iter()
                    .map(|_| self.rng().gen_range(0.1..1.0))
                    .collect();
                let sum: f64 = raw.iter().sum();
                task.options
                    .iter()
                    .zip(&raw)
                    .map(|(option, value)| (option.clone(), value / sum))
                    .collect()
            };
            preferences.insert(name, shares);
        }
        preferences
    }
}

/// Move every agent's shares toward the group mean by the fixed factor.
fn adjust_toward_mean(current: &Preferences, mean: &BTreeMap<String, f64>) -> Preferences {
    current
        .iter()
        .map(|(agent, shares)| {
            let adjusted = shares
                .iter()
                .map(|(option, share)| {
                    let target = mean.get(option).copied().unwrap_or(0.0);
                    (option.clone(), share + ADJUSTMENT_FACTOR * (target - share))
                })
                .collect();
            (agent.clone(), adjusted)
        })
        .collect()
}

/// Highest-supported option; ties resolve to the first in sorted order.
fn leading(support: &BTreeMap<String, f64>) -> Option<(String, f64)> {
    let mut best: Option<(&String, f64)> = None;
    for (option, share) in support {
        match best {
            Some((_, top)) if *share <= top => {}
            _ => best = Some((option, *share)),
        }
    }
    best.map(|(option, share)| (option.clone(), share))
}

#[cfg(test)]
mod tests {
    use super::*;
    use edrr_domain::{Agent, ConsensusParams};

    fn consensus_task(options: &[&str]) -> Task {
        Task::new("settle the approach").with_options(options.iter().copied())
    }

    #[test]
    fn test_agreement_completes_in_first_round() {
        let mut engine = DecisionEngine::new(vec![
            Agent::new("a").with_expertise(["alpha"]),
            Agent::new("b").with_expertise(["alpha"]),
        ])
        .with_seed(11);

        let result = engine.build_consensus(&consensus_task(&["alpha", "beta"]));
        assert_eq!(result.status, ConsensusStatus::Completed);
        assert_eq!(result.result.as_deref(), Some("alpha"));
        assert_eq!(result.rounds.len(), 1);
    }

    #[test]
    fn test_split_preferences_settle_partial() {
        let mut engine = DecisionEngine::new(vec![
            Agent::new("a").with_expertise(["alpha"]),
            Agent::new("b").with_expertise(["beta"]),
        ])
        .with_seed(11);

        let result = engine.build_consensus(&consensus_task(&["alpha", "beta"]));
        assert_eq!(result.status, ConsensusStatus::PartialConsensus);
        assert_eq!(result.rounds.len(), 3);
        assert!(result.result.is_some());
        assert!(!result.final_preferences.is_empty());
    }

    #[test]
    fn test_task_params_override_defaults() {
        let mut engine = DecisionEngine::new(vec![
            Agent::new("a").with_expertise(["alpha"]),
            Agent::new("b").with_expertise(["beta"]),
        ])
        .with_seed(11);

        let task = consensus_task(&["alpha", "beta"]).with_consensus(ConsensusParams {
            threshold: 0.4,
            max_rounds: 1,
        });
        let result = engine.build_consensus(&task);
        assert_eq!(result.status, ConsensusStatus::Completed);
        assert_eq!(result.rounds.len(), 1);
    }

    #[test]
    fn test_single_round_below_threshold_is_partial() {
        let mut engine = DecisionEngine::new(vec![
            Agent::new("a").with_expertise(["alpha"]),
            Agent::new("b").with_expertise(["beta"]),
        ])
        .with_seed(11);

        // Split 0.5/0.5 never reaches 0.6, so one round settles partial.
        let task = consensus_task(&["alpha", "beta"]).with_consensus(ConsensusParams {
            threshold: 0.6,
            max_rounds: 1,
        });
        let result = engine.build_consensus(&task);
        assert_eq!(result.status, ConsensusStatus::PartialConsensus);
        assert_eq!(result.rounds.len(), 1);
        assert!(result.result.is_some());
    }

    #[test]
    fn test_missing_inputs_fail_informationally() {
        let mut empty_team = DecisionEngine::new(Vec::new());
        let failed = empty_team.build_consensus(&consensus_task(&["alpha"]));
        assert_eq!(failed.status, ConsensusStatus::Failed);

        let mut engine = DecisionEngine::new(vec![Agent::new("a")]).with_seed(1);
        let failed = engine.build_consensus(&Task::new("no options here"));
        assert_eq!(failed.status, ConsensusStatus::Failed);
    }

    #[test]
    fn test_adjustment_narrows_spread_without_moving_mean() {
        let current: Preferences = [
            (
                "a".to_string(),
                [("x".to_string(), 1.0), ("y".to_string(), 0.0)].into(),
            ),
            (
                "b".to_string(),
                [("x".to_string(), 0.0), ("y".to_string(), 1.0)].into(),
            ),
        ]
        .into();
        let mean = aggregate(&current);
        let adjusted = adjust_toward_mean(&current, &mean);

        assert!((adjusted["a"]["x"] - 0.9).abs() < 1e-9);
        assert!((adjusted["a"]["y"] - 0.1).abs() < 1e-9);
        let new_mean = aggregate(&adjusted);
        assert!((new_mean["x"] - mean["x"]).abs() < 1e-9);
    }

    #[test]
    fn test_consensus_vote_reports_confidence() {
        let mut engine = DecisionEngine::new(vec![
            Agent::new("a").with_expertise(["alpha"]),
            Agent::new("b").with_expertise(["alpha"]),
            Agent::new("c").with_expertise(["beta"]),
        ])
        .with_seed(11);

        let vote = engine.consensus_vote(&consensus_task(&["alpha", "beta"]));
        assert_eq!(vote.status, ConsensusStatus::Completed);
        assert_eq!(vote.decision.as_deref(), Some("alpha"));
        assert!((vote.confidence - 2.0 / 3.0).abs() < 1e-9);
    }
}
