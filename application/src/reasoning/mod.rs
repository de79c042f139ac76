//! Bounded iterative refinement loop
//!
//! Repeatedly applies an injected [`ReasoningStep`], carrying each
//! iteration's synthesis forward as the task's working solution and
//! reporting phase-tagged results to a [`PhaseRecorder`]. The loop is
//! bounded three ways: a hard iteration cap, a wall-clock budget checked
//! before every iteration, and a retry limit for transient step
//! failures. Transient exhaustion and consensus failures stop the loop
//! non-fatally, preserving whatever results were already produced.

use crate::config::LoopParams;
use crate::ports::clock::Clock;
use crate::ports::reasoning::{ReasoningError, ReasoningStep, StepOutcome, StepResult};
use crate::ports::recorder::PhaseRecorder;
use edrr_domain::{Phase, Task};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Next phase assumed when a step reports an unrecognized phase string.
///
/// The loop never aborts on an unknown phase; it advances through the
/// normal order and stays at Retrospect once there.
fn fallback_transition(phase: Phase) -> Phase {
    phase.next().unwrap_or(Phase::Retrospect)
}

/// The dialectical reasoning loop
pub struct ReasoningLoop {
    params: LoopParams,
    clock: Arc<dyn Clock>,
    /// Phase the loop starts in; iterations may move it via reported phases
    phase: Phase,
}

impl ReasoningLoop {
    pub fn new(params: LoopParams, clock: Arc<dyn Clock>) -> Self {
        Self {
            params,
            clock,
            phase: Phase::Expand,
        }
    }

    /// Set the phase the first iteration is attributed to.
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Run the loop over `task`, returning all step results produced.
    ///
    /// Only [`ReasoningError::Fatal`] propagates; every other failure
    /// mode degrades to an early return of the partial results.
    pub fn run(
        &self,
        task: &Task,
        step: &mut dyn ReasoningStep,
        recorder: &mut dyn PhaseRecorder,
    ) -> Result<Vec<StepResult>, ReasoningError> {
        let started = self.clock.now();
        let mut rng = match self.params.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut task = task.clone();
        let mut current_phase = self.phase;
        let mut results: Vec<StepResult> = Vec::new();

        for iteration in 0..self.params.max_iterations {
            let elapsed = self.clock.now().saturating_sub(started);
            if elapsed >= self.params.max_total {
                info!(iteration, ?elapsed, "time budget exhausted; stopping loop");
                return Ok(results);
            }

            let outcome = match self.apply_with_retry(&task, step, &mut rng) {
                Ok(outcome) => outcome,
                Err(ReasoningError::Transient(message)) => {
                    warn!(iteration, message, "transient retries exhausted; stopping loop");
                    return Ok(results);
                }
                Err(ReasoningError::ConsensusFailure(message)) => {
                    warn!(iteration, message, phase = %current_phase, "consensus failed; stopping loop");
                    recorder.record_consensus_failure(current_phase, &message);
                    return Ok(results);
                }
                Err(fatal) => return Err(fatal),
            };

            let result = outcome.result().clone();
            current_phase = match result.reported_phase.parse::<Phase>() {
                Ok(reported) => reported,
                Err(_) => {
                    let next = fallback_transition(current_phase);
                    debug!(
                        reported = %result.reported_phase,
                        assumed = %next,
                        "unrecognized reported phase; using fallback transition"
                    );
                    next
                }
            };
            if let Some(note) = &result.note {
                debug!(iteration, note, "step note recorded");
            }
            recorder.record_for_phase(current_phase, &result);

            task.solution = Some(result.synthesis.clone());
            results.push(result);

            if let StepOutcome::Completed(_) = outcome {
                info!(iteration, "reasoning step reported completion");
                break;
            }
        }
        Ok(results)
    }

    /// Apply the step, retrying transient failures with exponential
    /// backoff on the injected clock.
    fn apply_with_retry(
        &self,
        task: &Task,
        step: &mut dyn ReasoningStep,
        rng: &mut StdRng,
    ) -> Result<StepOutcome, ReasoningError> {
        let mut failures = 0;
        loop {
            match step.apply(task, rng) {
                Ok(outcome) => return Ok(outcome),
                Err(ReasoningError::Transient(message)) => {
                    failures += 1;
                    if failures > self.params.retry_attempts {
                        return Err(ReasoningError::Transient(message));
                    }
                    let backoff = self.params.initial_backoff * 2u32.pow(failures as u32 - 1);
                    warn!(failures, ?backoff, message, "transient step failure; backing off");
                    self.clock.sleep(backoff);
                }
                Err(other) => return Err(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::clock::ManualClock;
    use crate::ports::recorder::NoRecorder;
    use rand::Rng;
    use serde_json::json;
    use std::time::Duration;

    /// Step double that replays a scripted list of outcomes.
    struct ScriptedStep {
        calls: usize,
        script: Vec<Result<StepOutcome, ReasoningError>>,
    }

    impl ScriptedStep {
        fn new(script: Vec<Result<StepOutcome, ReasoningError>>) -> Self {
            Self { calls: 0, script }
        }
    }

    impl ReasoningStep for ScriptedStep {
        fn apply(
            &mut self,
            _task: &Task,
            _rng: &mut StdRng,
        ) -> Result<StepOutcome, ReasoningError> {
            let index = self.calls;
            self.calls += 1;
            match self.script.get(index) {
                Some(Ok(outcome)) => Ok(outcome.clone()),
                Some(Err(ReasoningError::Transient(m))) => {
                    Err(ReasoningError::Transient(m.clone()))
                }
                Some(Err(ReasoningError::ConsensusFailure(m))) => {
                    Err(ReasoningError::ConsensusFailure(m.clone()))
                }
                Some(Err(ReasoningError::Fatal(m))) => Err(ReasoningError::Fatal(m.clone())),
                None => Err(ReasoningError::Transient("script exhausted".to_string())),
            }
        }
    }

    /// Step double that always fails transiently.
    struct AlwaysTransient {
        calls: usize,
    }

    impl ReasoningStep for AlwaysTransient {
        fn apply(
            &mut self,
            _task: &Task,
            _rng: &mut StdRng,
        ) -> Result<StepOutcome, ReasoningError> {
            self.calls += 1;
            Err(ReasoningError::Transient("backend overloaded".to_string()))
        }
    }

    #[derive(Default)]
    struct CapturingRecorder {
        phases: Vec<Phase>,
        failures: Vec<(Phase, String)>,
    }

    impl PhaseRecorder for CapturingRecorder {
        fn record_expand_result(&mut self, _result: &StepResult) {
            self.phases.push(Phase::Expand);
        }
        fn record_differentiate_result(&mut self, _result: &StepResult) {
            self.phases.push(Phase::Differentiate);
        }
        fn record_refine_result(&mut self, _result: &StepResult) {
            self.phases.push(Phase::Refine);
        }
        fn record_retrospect_result(&mut self, _result: &StepResult) {
            self.phases.push(Phase::Retrospect);
        }
        fn record_consensus_failure(&mut self, phase: Phase, message: &str) {
            self.failures.push((phase, message.to_string()));
        }
    }

    fn continue_result(phase: &str, synthesis: serde_json::Value) -> Result<StepOutcome, ReasoningError> {
        Ok(StepOutcome::Continue(StepResult::new(phase, synthesis)))
    }

    fn completed_result(phase: &str, synthesis: serde_json::Value) -> Result<StepOutcome, ReasoningError> {
        Ok(StepOutcome::Completed(StepResult::new(phase, synthesis)))
    }

    #[test]
    fn test_exhausted_budget_never_invokes_step() {
        let params = LoopParams::default().with_max_total(Duration::ZERO);
        let reasoning = ReasoningLoop::new(params, Arc::new(ManualClock::new()));
        let mut step = AlwaysTransient { calls: 0 };

        let results = reasoning
            .run(&Task::new("budgeted"), &mut step, &mut NoRecorder)
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(step.calls, 0);
    }

    #[test]
    fn test_transient_failures_retry_then_stop() {
        let clock = Arc::new(ManualClock::new());
        let params = LoopParams::default()
            .with_retry_attempts(2)
            .with_initial_backoff(Duration::from_millis(250));
        let reasoning = ReasoningLoop::new(params, Arc::clone(&clock) as Arc<dyn Clock>);
        let mut step = AlwaysTransient { calls: 0 };

        let results = reasoning
            .run(&Task::new("flaky"), &mut step, &mut NoRecorder)
            .unwrap();
        assert!(results.is_empty());
        // Initial attempt plus two retries.
        assert_eq!(step.calls, 3);
        // Backoff doubled: 250ms then 500ms of virtual time.
        assert_eq!(clock.now(), Duration::from_millis(750));
    }

    #[test]
    fn test_fatal_error_propagates() {
        let reasoning = ReasoningLoop::new(LoopParams::default(), Arc::new(ManualClock::new()));
        let mut step = ScriptedStep::new(vec![Err(ReasoningError::Fatal("corrupt state".into()))]);

        let outcome = reasoning.run(&Task::new("doomed"), &mut step, &mut NoRecorder);
        assert!(matches!(outcome, Err(ReasoningError::Fatal(_))));
    }

    #[test]
    fn test_consensus_failure_reports_and_preserves_progress() {
        let reasoning = ReasoningLoop::new(LoopParams::default(), Arc::new(ManualClock::new()));
        let mut step = ScriptedStep::new(vec![
            continue_result("expand", json!({"ideas": 4})),
            Err(ReasoningError::ConsensusFailure("stalled at 0.5".into())),
        ]);
        let mut recorder = CapturingRecorder::default();

        let results = reasoning
            .run(&Task::new("contested"), &mut step, &mut recorder)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(recorder.failures.len(), 1);
        assert_eq!(recorder.failures[0].0, Phase::Expand);
        assert!(recorder.failures[0].1.contains("stalled"));
    }

    #[test]
    fn test_solution_carries_forward() {
        struct SolutionProbe {
            seen: Vec<Option<serde_json::Value>>,
        }
        impl ReasoningStep for SolutionProbe {
            fn apply(
                &mut self,
                task: &Task,
                _rng: &mut StdRng,
            ) -> Result<StepOutcome, ReasoningError> {
                self.seen.push(task.solution.clone());
                let synthesis = json!({"round": self.seen.len()});
                if self.seen.len() == 2 {
                    Ok(StepOutcome::Completed(StepResult::new("refine", synthesis)))
                } else {
                    Ok(StepOutcome::Continue(StepResult::new("expand", synthesis)))
                }
            }
        }

        let reasoning = ReasoningLoop::new(LoopParams::default(), Arc::new(ManualClock::new()));
        let mut step = SolutionProbe { seen: Vec::new() };
        let results = reasoning
            .run(&Task::new("iterative"), &mut step, &mut NoRecorder)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(step.seen[0], None);
        assert_eq!(step.seen[1], Some(json!({"round": 1})));
    }

    #[test]
    fn test_step_notes_survive_in_results() {
        let reasoning = ReasoningLoop::new(LoopParams::default(), Arc::new(ManualClock::new()));
        let annotated = StepResult::new("refine", json!({"final": true}))
            .with_note("adopted the second thesis");
        let mut step = ScriptedStep::new(vec![Ok(StepOutcome::Completed(annotated))]);

        let results = reasoning
            .run(&Task::new("annotated"), &mut step, &mut NoRecorder)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].note.as_deref(),
            Some("adopted the second thesis")
        );
    }

    #[test]
    fn test_dispatch_follows_reported_phase() {
        let reasoning = ReasoningLoop::new(LoopParams::default(), Arc::new(ManualClock::new()));
        let mut step = ScriptedStep::new(vec![
            continue_result("differentiate", json!(1)),
            completed_result("retrospect", json!(2)),
        ]);
        let mut recorder = CapturingRecorder::default();

        reasoning
            .run(&Task::new("phased"), &mut step, &mut recorder)
            .unwrap();
        assert_eq!(recorder.phases, vec![Phase::Differentiate, Phase::Retrospect]);
    }

    #[test]
    fn test_unknown_phase_uses_fallback_transition() {
        let reasoning = ReasoningLoop::new(LoopParams::default(), Arc::new(ManualClock::new()));
        let mut step = ScriptedStep::new(vec![
            continue_result("synthesizing", json!(1)),
            completed_result("still-thinking", json!(2)),
        ]);
        let mut recorder = CapturingRecorder::default();

        let results = reasoning
            .run(&Task::new("vague"), &mut step, &mut recorder)
            .unwrap();
        // Unknown strings advance one phase at a time from Expand.
        assert_eq!(results.len(), 2);
        assert_eq!(recorder.phases, vec![Phase::Differentiate, Phase::Refine]);
    }

    #[test]
    fn test_iteration_cap() {
        let params = LoopParams::default().with_max_iterations(4);
        let reasoning = ReasoningLoop::new(params, Arc::new(ManualClock::new()));
        let mut step = ScriptedStep::new(vec![
            continue_result("expand", json!(1)),
            continue_result("expand", json!(2)),
            continue_result("expand", json!(3)),
            continue_result("expand", json!(4)),
            continue_result("expand", json!(5)),
        ]);

        let results = reasoning
            .run(&Task::new("unbounded"), &mut step, &mut NoRecorder)
            .unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(step.calls, 4);
    }

    #[test]
    fn test_deterministic_seed_reproduces_runs() {
        struct RandomStep;
        impl ReasoningStep for RandomStep {
            fn apply(
                &mut self,
                _task: &Task,
                rng: &mut StdRng,
            ) -> Result<StepOutcome, ReasoningError> {
                let pick: u32 = rng.gen_range(0..1000);
                Ok(StepOutcome::Completed(StepResult::new(
                    "refine",
                    json!({ "pick": pick }),
                )))
            }
        }

        let run = || {
            let params = LoopParams::default().with_deterministic_seed(123);
            let reasoning = ReasoningLoop::new(params, Arc::new(ManualClock::new()));
            let results = reasoning
                .run(&Task::new("seeded"), &mut RandomStep, &mut NoRecorder)
                .unwrap();
            results[0].synthesis.clone()
        };
        assert_eq!(run(), run());
    }
}
