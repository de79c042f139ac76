//! Vote records for critical team decisions
//!
//! A [`VoteRecord`] captures one vote from collection through resolution.
//! Tallies are always recomputed from the raw per-agent vote mapping so
//! a record can never carry counts that disagree with its votes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// How a vote is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteMethod {
    /// One agent, one vote; highest count wins
    Majority,
    /// Votes weighted by expertise-domain relevance
    Weighted,
}

impl VoteMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteMethod::Majority => "majority",
            VoteMethod::Weighted => "weighted",
        }
    }
}

impl FromStr for VoteMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "majority" => Ok(VoteMethod::Majority),
            "weighted" => Ok(VoteMethod::Weighted),
            other => Err(format!("unknown voting method: {other}")),
        }
    }
}

/// Lifecycle status of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteStatus {
    /// Votes collected, not yet resolved
    Pending,
    /// Resolved to a single winning option
    Completed,
    /// A tie was detected (before tie-breaking)
    Tied,
    /// The vote could not be conducted; see explanation
    Failed,
}

/// Immutable record of one critical decision vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Unique record id
    pub id: String,
    /// When the vote was initiated
    pub timestamp: DateTime<Utc>,
    /// The task this decision belongs to
    pub task_id: String,
    /// Resolution method
    pub method: VoteMethod,
    /// The options voted on
    pub options: Vec<String>,
    /// Per-agent vote: agent name → chosen option
    pub votes: BTreeMap<String, String>,
    /// Per-agent reasoning for the chosen option
    pub reasoning: BTreeMap<String, String>,
    /// Per-agent weights (weighted method only)
    pub weights: Option<BTreeMap<String, f64>>,
    /// Current status
    pub status: VoteStatus,
    /// Winning option once resolved
    pub result: Option<String>,
    /// Human-readable account of how the result was reached
    pub explanation: String,
}

impl VoteRecord {
    pub fn new(task_id: impl Into<String>, method: VoteMethod, options: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            task_id: task_id.into(),
            method,
            options,
            votes: BTreeMap::new(),
            reasoning: BTreeMap::new(),
            weights: None,
            status: VoteStatus::Pending,
            result: None,
            explanation: String::new(),
        }
    }

    /// Build a failed record for a vote that could not be conducted.
    ///
    /// This is an informational outcome, not an error.
    pub fn failed(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut record = Self::new(task_id, VoteMethod::Majority, Vec::new());
        record.status = VoteStatus::Failed;
        record.explanation = reason.into();
        record
    }

    /// Record one agent's vote with its reasoning.
    pub fn record_vote(
        &mut self,
        agent: impl Into<String>,
        option: impl Into<String>,
        reasoning: impl Into<String>,
    ) {
        let agent = agent.into();
        self.votes.insert(agent.clone(), option.into());
        self.reasoning.insert(agent, reasoning.into());
    }

    /// Vote counts per option, recomputed from the raw votes.
    pub fn tally(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = self
            .options
            .iter()
            .map(|opt| (opt.clone(), 0))
            .collect();
        for vote in self.votes.values() {
            *counts.entry(vote.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Weighted sums per option, recomputed from votes and `weights`.
    ///
    /// Agents without an entry in `weights` count with weight 1.0.
    pub fn weighted_tally(&self) -> BTreeMap<String, f64> {
        let mut sums: BTreeMap<String, f64> = self
            .options
            .iter()
            .map(|opt| (opt.clone(), 0.0))
            .collect();
        for (agent, vote) in &self.votes {
            let weight = self
                .weights
                .as_ref()
                .and_then(|w| w.get(agent))
                .copied()
                .unwrap_or(1.0);
            *sums.entry(vote.clone()).or_insert(0.0) += weight;
        }
        sums
    }

    /// Options with the highest vote count.
    pub fn leading_options(&self) -> Vec<String> {
        let tally = self.tally();
        let max = tally.values().copied().max().unwrap_or(0);
        tally
            .into_iter()
            .filter(|(_, count)| *count == max)
            .map(|(opt, _)| opt)
            .collect()
    }

    /// Options with the highest weighted sum (within a small epsilon).
    pub fn leading_weighted_options(&self) -> Vec<String> {
        let tally = self.weighted_tally();
        let max = tally.values().copied().fold(f64::MIN, f64::max);
        tally
            .into_iter()
            .filter(|(_, sum)| (sum - max).abs() < 1e-9)
            .map(|(opt, _)| opt)
            .collect()
    }

    /// Resolve the record to a winning option.
    pub fn resolve(&mut self, winner: impl Into<String>, explanation: impl Into<String>) {
        self.result = Some(winner.into());
        self.explanation = explanation.into();
        self.status = VoteStatus::Completed;
    }
}
