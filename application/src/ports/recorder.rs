//! Phase recorder port
//!
//! The reasoning loop reports phase-tagged progress through this
//! interface; the Phase Coordinator is the typical implementation.
//! Dispatch is by each result's *reported* phase, not the loop's
//! statically configured phase, so mid-loop phase changes are
//! faithfully recorded.

use super::reasoning::StepResult;
use edrr_domain::Phase;

/// Callback hooks for reasoning-loop progress
pub trait PhaseRecorder {
    /// Called for results reported under the Expand phase.
    fn record_expand_result(&mut self, _result: &StepResult) {}

    /// Called for results reported under the Differentiate phase.
    fn record_differentiate_result(&mut self, _result: &StepResult) {}

    /// Called for results reported under the Refine phase.
    fn record_refine_result(&mut self, _result: &StepResult) {}

    /// Called for results reported under the Retrospect phase.
    fn record_retrospect_result(&mut self, _result: &StepResult) {}

    /// Called when the loop stops a phase because consensus stalled.
    fn record_consensus_failure(&mut self, _phase: Phase, _message: &str) {}
}

impl dyn PhaseRecorder + '_ {
    /// Dispatch `result` to the hook matching `phase`.
    pub fn record_for_phase(&mut self, phase: Phase, result: &StepResult) {
        match phase {
            Phase::Expand => self.record_expand_result(result),
            Phase::Differentiate => self.record_differentiate_result(result),
            Phase::Refine => self.record_refine_result(result),
            Phase::Retrospect => self.record_retrospect_result(result),
        }
    }
}

/// No-op recorder for when progress recording is not needed
pub struct NoRecorder;

impl PhaseRecorder for NoRecorder {}
