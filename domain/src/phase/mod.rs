//! EDRR phases and per-phase results
//!
//! The four methodology phases form a fixed, strictly-forward sequence.
//! [`Phase`] carries the ordering plus the expertise keywords that bias
//! role assignment toward the kind of thinking each phase demands.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// A phase of the EDRR cycle
///
/// Phases are ordered: Expand → Differentiate → Refine → Retrospect.
/// Expand is the initial phase, Retrospect is terminal.
///
/// # Example
///
/// ```
/// use edrr_domain::Phase;
///
/// assert_eq!(Phase::Expand.next(), Some(Phase::Differentiate));
/// assert_eq!(Phase::Retrospect.next(), None);
/// assert!(Phase::Expand < Phase::Refine);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Divergent thinking, broad exploration, idea generation
    Expand,
    /// Comparative analysis, option evaluation, trade-off analysis
    Differentiate,
    /// Detail elaboration, implementation, quality assurance
    Refine,
    /// Learning extraction, reflection, final reporting
    Retrospect,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 4] = [
        Phase::Expand,
        Phase::Differentiate,
        Phase::Refine,
        Phase::Retrospect,
    ];

    /// Position of this phase in the cycle (0-indexed).
    pub fn index(&self) -> usize {
        match self {
            Phase::Expand => 0,
            Phase::Differentiate => 1,
            Phase::Refine => 2,
            Phase::Retrospect => 3,
        }
    }

    /// The phase that follows this one, or `None` at the terminal phase.
    pub fn next(&self) -> Option<Phase> {
        Phase::ALL.get(self.index() + 1).copied()
    }

    /// Whether this is the terminal phase of the cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Retrospect)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Expand => "expand",
            Phase::Differentiate => "differentiate",
            Phase::Refine => "refine",
            Phase::Retrospect => "retrospect",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Phase::Expand => "Expand",
            Phase::Differentiate => "Differentiate",
            Phase::Refine => "Refine",
            Phase::Retrospect => "Retrospect",
        }
    }

    /// Expertise keywords that weight role scoring during this phase.
    ///
    /// Agents whose expertise tags overlap these keywords receive a
    /// doubled bonus when the Primus is selected for the phase.
    pub fn expertise_keywords(&self) -> &'static [&'static str] {
        match self {
            Phase::Expand => &[
                "brainstorming",
                "exploration",
                "divergent thinking",
                "idea generation",
                "research",
                "creativity",
                "innovation",
            ],
            Phase::Differentiate => &[
                "analysis",
                "evaluation",
                "comparison",
                "classification",
                "critical thinking",
                "assessment",
                "judgment",
            ],
            Phase::Refine => &[
                "implementation",
                "coding",
                "refinement",
                "optimization",
                "precision",
                "quality control",
                "revision",
            ],
            Phase::Retrospect => &[
                "reflection",
                "documentation",
                "retrospective",
                "review",
                "learning",
                "insight",
                "metacognition",
            ],
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Phase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "expand" => Ok(Phase::Expand),
            "differentiate" => Ok(Phase::Differentiate),
            "refine" => Ok(Phase::Refine),
            "retrospect" | "reflect" => Ok(Phase::Retrospect),
            other => Err(DomainError::UnknownPhase(other.to_string())),
        }
    }
}

/// Output record of one executed phase
///
/// Every phase execution produces one of these, keyed by phase name in
/// the cycle state. The `quality_score` feeds the auto-transition gate;
/// `phase_complete` short-circuits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    /// The phase this result belongs to
    pub phase: Phase,
    /// Measured quality of the phase output (0.0 to 1.0)
    pub quality_score: f64,
    /// Explicit completion marker; overrides the quality gate when set
    pub phase_complete: bool,
    /// Phase-specific output payload
    pub payload: serde_json::Value,
    /// Error messages from failed micro cycles, recorded not propagated
    pub errors: Vec<String>,
    /// Results of nested micro cycles keyed by child cycle id
    pub micro_cycle_results: BTreeMap<String, serde_json::Value>,
}

impl PhaseResult {
    pub fn new(phase: Phase, payload: serde_json::Value) -> Self {
        Self {
            phase,
            quality_score: 0.0,
            phase_complete: false,
            payload,
            errors: Vec::new(),
            micro_cycle_results: BTreeMap::new(),
        }
    }

    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = score.clamp(0.0, 1.0);
        self
    }

    pub fn mark_complete(mut self) -> Self {
        self.phase_complete = true;
        self
    }

    /// Record a micro-cycle failure without failing the parent phase.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}
