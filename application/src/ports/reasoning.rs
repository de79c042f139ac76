//! Reasoning step port
//!
//! The dialectical reasoning step is injected by the host (typically a
//! text-generation backend behind its own retry wrapper). The loop only
//! sees the classified error taxonomy below.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure classification for reasoning steps
#[derive(Error, Debug)]
pub enum ReasoningError {
    /// Retryable failure; the loop backs off and tries again
    #[error("Transient reasoning failure: {0}")]
    Transient(String),

    /// Consensus stalled; reported via the failure hook, loop stops
    #[error("Consensus failure: {0}")]
    ConsensusFailure(String),

    /// Unrecoverable failure; propagated to the caller
    #[error("Fatal reasoning failure: {0}")]
    Fatal(String),
}

/// One iteration's output from the reasoning step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Phase the step reports itself to be in (free-form string;
    /// unrecognized values fall back to the loop's transition map)
    pub reported_phase: String,
    /// Synthesis carried forward as the next iteration's solution
    pub synthesis: Value,
    /// Optional note for the audit trail
    pub note: Option<String>,
}

impl StepResult {
    pub fn new(reported_phase: impl Into<String>, synthesis: Value) -> Self {
        Self {
            reported_phase: reported_phase.into(),
            synthesis,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Whether the loop should continue after a step
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Keep iterating with this result's synthesis as the new solution
    Continue(StepResult),
    /// The solution is final; the loop stops after recording this result
    Completed(StepResult),
}

impl StepOutcome {
    pub fn result(&self) -> &StepResult {
        match self {
            StepOutcome::Continue(result) | StepOutcome::Completed(result) => result,
        }
    }
}

/// Injected dialectical reasoning step
pub trait ReasoningStep {
    /// Run one refinement iteration over `task`.
    ///
    /// The task's `solution` carries the previous iteration's synthesis.
    /// `rng` is the loop's seedable randomness source; steps needing
    /// randomness must draw from it and nowhere else.
    fn apply(
        &mut self,
        task: &edrr_domain::Task,
        rng: &mut StdRng,
    ) -> Result<StepOutcome, ReasoningError>;
}
