//! Team Decision Engine
//!
//! One [`DecisionEngine`] owns the roster, the role assignments, the
//! voting history, and the seedable randomness source. Its behavior is
//! split across three explicit interfaces composed at construction:
//!
//! - [`RoleAssigner`] — Primus selection, phase role assignment, rotation
//! - [`Voter`] — critical-decision voting with auditable records
//! - [`ConsensusBuilder`] — multi-round consensus and the single-shot vote
//!
//! Voting history and per-cycle state are fields with an explicit
//! lifecycle tied to a cycle id (see [`DecisionEngine::begin_cycle`]),
//! never ambient global state.

mod consensus;
mod roles;
mod voting;

pub use consensus::ConsensusVote;

use edrr_domain::{
    Agent, ConsensusResult, DomainError, Phase, RoleAssignments, Task, VoteRecord,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;

/// Role assignment interface
pub trait RoleAssigner {
    /// Select the Primus for `phase` by expertise scoring over `task`.
    ///
    /// The current Primus is included in rescoring, not skipped. Ties
    /// prefer an agent who has never served; once every agent has
    /// served, the served flags reset and rotation restarts clean.
    fn select_primus_by_expertise(&mut self, phase: Phase, task: &Task)
        -> Result<String, DomainError>;

    /// Assign the remaining roles for `phase`, never giving one agent
    /// two roles. An agent with no keyword match falls back to Worker.
    fn assign_roles_for_phase(&mut self, phase: Phase, task: &Task)
        -> Result<RoleAssignments, DomainError>;

    /// Plain round-robin Primus rotation with no task context.
    fn rotate_primus(&mut self) -> Result<String, DomainError>;
}

/// Voting interface
pub trait Voter {
    /// Conduct a vote on a critical decision.
    ///
    /// Missing options or an unknown method yield a `Failed` record,
    /// not an error. The returned record is also appended to the
    /// engine's voting history for audit.
    fn vote_on_critical_decision(&mut self, task: &Task) -> VoteRecord;
}

/// Consensus-building interface
pub trait ConsensusBuilder {
    /// Run up to `max_rounds` rounds of preference adjustment.
    fn build_consensus(&mut self, task: &Task) -> ConsensusResult;

    /// Single-shot lightweight variant returning a decision plus
    /// confidence, for when full convergence is unnecessary.
    fn consensus_vote(&mut self, task: &Task) -> ConsensusVote;
}

/// The team decision engine
///
/// # Example
///
/// ```
/// use edrr_application::team::{DecisionEngine, RoleAssigner};
/// use edrr_domain::{Agent, Phase, Task};
///
/// let mut engine = DecisionEngine::new(vec![
///     Agent::new("ada").with_expertise(["brainstorming"]),
///     Agent::new("grace").with_expertise(["analysis"]),
/// ])
/// .with_seed(7);
///
/// let primus = engine
///     .select_primus_by_expertise(Phase::Expand, &Task::new("explore options"))
///     .unwrap();
/// assert_eq!(primus, "ada");
/// ```
pub struct DecisionEngine {
    agents: Vec<Agent>,
    roles: RoleAssignments,
    /// Roster index of the current Primus, for round-robin rotation
    primus_index: Option<usize>,
    voting_history: Vec<VoteRecord>,
    cycle_id: Option<String>,
    rng: StdRng,
}

impl DecisionEngine {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            agents,
            roles: RoleAssignments::new(),
            primus_index: None,
            voting_history: Vec::new(),
            cycle_id: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Seed all tie-break and unmatched-vote randomness.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Reseed in place; used when a caller threads a deterministic seed.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Start a new cycle: clears the voting history and binds the
    /// engine's per-cycle state to `cycle_id`.
    pub fn begin_cycle(&mut self, cycle_id: impl Into<String>) {
        self.cycle_id = Some(cycle_id.into());
        self.voting_history.clear();
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn roles(&self) -> &RoleAssignments {
        &self.roles
    }

    /// Name of the current Primus, if one is assigned.
    pub fn primus(&self) -> Option<&str> {
        self.roles.primus()
    }

    /// All vote records from the current cycle, in decision order.
    pub fn voting_history(&self) -> &[VoteRecord] {
        &self.voting_history
    }

    pub fn cycle_id(&self) -> Option<&str> {
        self.cycle_id.as_deref()
    }

    // ==================== Shared Scoring ====================

    /// Expertise score of `agent` for `task` during `phase`.
    ///
    /// Task-keyword overlap counts once per matching tag; overlap with
    /// the phase's own keywords is weighted double.
    pub(crate) fn phase_expertise_score(agent: &Agent, phase: Phase, keywords: &BTreeSet<String>) -> usize {
        let base = agent
            .expertise
            .iter()
            .filter(|tag| Self::tag_matches(tag, keywords))
            .count();
        let phase_text = phase.expertise_keywords().join(" ");
        let bonus = agent
            .expertise
            .iter()
            .filter(|tag| {
                let tag = tag.to_lowercase();
                phase_text.contains(&tag)
                    || phase
                        .expertise_keywords()
                        .iter()
                        .any(|kw| tag.contains(kw))
            })
            .count();
        base + bonus * 2
    }

    fn tag_matches(tag: &str, keywords: &BTreeSet<String>) -> bool {
        let tag = tag.to_lowercase();
        keywords
            .iter()
            .any(|kw| tag.contains(kw.as_str()) || kw.contains(&tag))
    }

    /// Seeded uniform choice among `items`; `None` only when empty.
    pub(crate) fn choose<'a>(&mut self, items: &'a [String]) -> Option<&'a String> {
        items.choose(&mut self.rng)
    }

    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub(crate) fn push_vote_record(&mut self, record: VoteRecord) {
        self.voting_history.push(record);
    }

    pub(crate) fn agents_mut(&mut self) -> &mut Vec<Agent> {
        &mut self.agents
    }

    pub(crate) fn roles_mut(&mut self) -> &mut RoleAssignments {
        &mut self.roles
    }

    pub(crate) fn set_primus_index(&mut self, index: Option<usize>) {
        self.primus_index = index;
    }

    pub(crate) fn primus_index(&self) -> Option<usize> {
        self.primus_index
    }
}
