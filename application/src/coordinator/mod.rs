//! Phase Coordinator
//!
//! Owns the four-phase state machine for one cycle: strictly-forward
//! transitions with dependency checks, quality-gated and timeout-based
//! auto-progression, recursive micro cycles for subtasks, and final
//! reporting. Every decision inside a phase is delegated to the
//! [`DecisionEngine`]; phase-tagged snapshots go to the injected
//! [`MemoryStore`] with store failures logged and swallowed.

mod report;

use crate::config::CoordinatorConfig;
use crate::ports::clock::Clock;
use crate::ports::memory::MemoryStore;
use crate::ports::reasoning::StepResult;
use crate::ports::recorder::PhaseRecorder;
use crate::team::{ConsensusBuilder, DecisionEngine, RoleAssigner, Voter};
use edrr_domain::report::ChildCycleSummary;
use edrr_domain::{ConsensusStatus, DomainError, Phase, PhaseResult, Task, VoteStatus};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors raised by coordinator operations
///
/// Only structural contract violations surface here; quality and timeout
/// gating are control signals, and memory failures are swallowed.
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// The requested phase's dependencies are unmet (backward, repeated,
    /// or skipping transitions included)
    #[error("Phase dependency not met: {0}")]
    DependencyNotMet(String),

    /// Progression was requested from the terminal phase
    #[error("Cannot progress beyond terminal phase {0}")]
    TerminalPhase(Phase),

    /// No cycle has been started
    #[error("No active cycle; call start_cycle first")]
    NoActiveCycle,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// One entry in a cycle's execution history
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecutionEvent {
    pub phase: Phase,
    pub event: String,
    /// Clock reading when the event was recorded
    pub elapsed: Duration,
}

/// Mutable state of one EDRR cycle
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CycleState {
    pub cycle_id: String,
    pub task: Task,
    /// `None` until the cycle enters Expand
    pub current_phase: Option<Phase>,
    /// Per-phase results keyed by phase name
    pub results: BTreeMap<String, PhaseResult>,
    pub child_cycles: Vec<ChildCycleSummary>,
    pub history: Vec<ExecutionEvent>,
    /// Clock reading at each phase entry, for the timeout override
    pub phase_start: BTreeMap<Phase, Duration>,
}

impl CycleState {
    fn new(cycle_id: impl Into<String>, task: Task) -> Self {
        Self {
            cycle_id: cycle_id.into(),
            task,
            current_phase: None,
            results: BTreeMap::new(),
            child_cycles: Vec::new(),
            history: Vec::new(),
            phase_start: BTreeMap::new(),
        }
    }

    /// Result recorded for `phase`, if the phase has executed.
    pub fn result_for(&self, phase: Phase) -> Option<&PhaseResult> {
        self.results.get(phase.as_str())
    }
}

type SyncHook = Box<dyn FnMut(Phase)>;
type ChildFactory = Box<dyn Fn(&PhaseCoordinator) -> PhaseCoordinator>;

/// Coordinator for the Expand/Differentiate/Refine/Retrospect cycle
pub struct PhaseCoordinator {
    config: CoordinatorConfig,
    engine: DecisionEngine,
    memory: Arc<dyn MemoryStore>,
    clock: Arc<dyn Clock>,
    state: Option<CycleState>,
    /// Pending manual phase override, consumed exactly once
    manual_override: Option<Phase>,
    sync_hooks: Vec<SyncHook>,
    /// Builds coordinators for micro cycles; `None` inherits this
    /// coordinator's config, roster, and ports
    child_factory: Option<ChildFactory>,
    /// Guards the auto-progression loop against re-entry
    auto_progressing: bool,
    recursion_depth: usize,
    /// `(cycle_id, phase)` of the parent when this is a micro cycle
    parent: Option<(String, Phase)>,
    seed: Option<u64>,
}

impl PhaseCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        agents: Vec<edrr_domain::Agent>,
        memory: Arc<dyn MemoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            engine: DecisionEngine::new(agents),
            memory,
            clock,
            state: None,
            manual_override: None,
            sync_hooks: Vec::new(),
            child_factory: None,
            auto_progressing: false,
            recursion_depth: 0,
            parent: None,
            seed: None,
        }
    }

    /// Seed the decision engine's randomness for reproducible runs.
    ///
    /// The seed also propagates to micro cycles.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.engine.reseed(seed);
        self
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn state(&self) -> Option<&CycleState> {
        self.state.as_ref()
    }

    /// Phase the active cycle is currently in.
    pub fn current_phase(&self) -> Option<Phase> {
        self.state.as_ref().and_then(|s| s.current_phase)
    }

    /// Nesting depth of this coordinator (0 for a top-level cycle).
    pub fn recursion_depth(&self) -> usize {
        self.recursion_depth
    }

    /// Register a callback fired after every phase entry.
    pub fn register_sync_hook(&mut self, hook: impl FnMut(Phase) + 'static) {
        self.sync_hooks.push(Box::new(hook));
    }

    /// Queue a one-shot manual phase override for `decide_next_phase`.
    pub fn set_manual_override(&mut self, phase: Phase) {
        self.manual_override = Some(phase);
    }

    /// Override how micro-cycle coordinators are built.
    ///
    /// The default child inherits this coordinator's config, roster, and
    /// ports; hosts can supply a tighter config or a different roster
    /// for nested cycles.
    pub fn set_child_factory(
        &mut self,
        factory: impl Fn(&PhaseCoordinator) -> PhaseCoordinator + 'static,
    ) {
        self.child_factory = Some(Box::new(factory));
    }

    // ==================== Cycle Lifecycle ====================

    /// Start a new cycle for `task`: resets cycle state, rebinds the
    /// decision engine, and enters Expand.
    pub fn start_cycle(&mut self, task: Task) -> Result<String, CoordinatorError> {
        let cycle_id = Uuid::new_v4().to_string();
        info!(cycle_id = %cycle_id, task = %task.description, depth = self.recursion_depth, "starting cycle");

        self.engine.begin_cycle(&cycle_id);
        self.manual_override = None;
        let snapshot = serde_json::to_value(&task).unwrap_or(Value::Null);
        self.state = Some(CycleState::new(&cycle_id, task));
        self.store_quietly(snapshot, "CYCLE_TASK", Phase::Expand.as_str());

        self.progress_to_phase(Phase::Expand)?;
        Ok(cycle_id)
    }

    /// Advance the cycle to `phase`.
    ///
    /// Validates phase dependencies, rotates Primus and role assignments,
    /// snapshots context to memory, fires sync hooks, executes the
    /// phase's work, and then attempts auto-progression.
    pub fn progress_to_phase(&mut self, phase: Phase) -> Result<(), CoordinatorError> {
        let current = {
            let state = self.state.as_ref().ok_or(CoordinatorError::NoActiveCycle)?;
            state.current_phase
        };
        self.check_dependencies(current, phase)?;

        // Role rotation happens on every phase entry.
        let task = self.active_task()?;
        let roles = self.engine.assign_roles_for_phase(phase, &task)?;
        info!(phase = %phase, primus = roles.primus().unwrap_or("-"), "entering phase");

        let now = self.clock.now();
        let transition = json!({
            "from": current.map(|p| p.as_str()),
            "to": phase.as_str(),
            "roles": serde_json::to_value(&roles).unwrap_or(Value::Null),
        });
        self.store_quietly(transition, "PHASE_TRANSITION", phase.as_str());

        {
            let state = self.state.as_mut().ok_or(CoordinatorError::NoActiveCycle)?;
            state.current_phase = Some(phase);
            state.phase_start.insert(phase, now);
            state.history.push(ExecutionEvent {
                phase,
                event: "entered".to_string(),
                elapsed: now,
            });
        }

        for hook in &mut self.sync_hooks {
            hook(phase);
        }

        self.execute_current_phase()?;

        let finished = self.clock.now();
        if let Some(state) = self.state.as_mut() {
            state.history.push(ExecutionEvent {
                phase,
                event: "executed".to_string(),
                elapsed: finished,
            });
        }

        self.maybe_auto_progress()
    }

    /// Advance to the phase chosen by [`decide_next_phase`], if any.
    ///
    /// Returns `Ok(None)` when gating blocks progression; errors with
    /// [`CoordinatorError::TerminalPhase`] at Retrospect.
    ///
    /// [`decide_next_phase`]: PhaseCoordinator::decide_next_phase
    pub fn progress_to_next_phase(&mut self) -> Result<Option<Phase>, CoordinatorError> {
        let state = self.state.as_ref().ok_or(CoordinatorError::NoActiveCycle)?;
        if let Some(current) = state.current_phase {
            if current.is_terminal() {
                return Err(CoordinatorError::TerminalPhase(current));
            }
        }
        match self.decide_next_phase() {
            Some(next) => {
                self.progress_to_phase(next)?;
                Ok(Some(next))
            }
            None => Ok(None),
        }
    }

    /// Candidate next phase under the gating rules, or `None`.
    ///
    /// Applied in order: pending manual override (consumed exactly
    /// once), auto-transition disabled, completion flag / quality gate,
    /// timeout override, terminal phase.
    pub fn decide_next_phase(&mut self) -> Option<Phase> {
        if let Some(overridden) = self.manual_override.take() {
            debug!(phase = %overridden, "consuming manual phase override");
            return Some(overridden);
        }
        if !self.config.auto_transition {
            return None;
        }

        let state = self.state.as_ref()?;
        let current = state.current_phase?;
        let next = current.next()?;

        if let Some(result) = state.result_for(current) {
            if result.phase_complete {
                return Some(next);
            }
            match self.config.quality_threshold(current) {
                None => return Some(next),
                Some(threshold) if result.quality_score >= threshold => return Some(next),
                Some(_) => {}
            }
        }

        // Timeout override: once the phase budget has elapsed the cycle
        // moves on even with the quality gate unmet, preventing deadlock.
        let started = state.phase_start.get(&current).copied().unwrap_or_default();
        let elapsed = self.clock.now().saturating_sub(started);
        if elapsed > self.config.phase_transition_timeout {
            warn!(phase = %current, ?elapsed, "phase timeout elapsed; overriding quality gate");
            return Some(next);
        }
        None
    }

    /// Run the auto-progression loop until gating blocks or the cycle
    /// reaches Retrospect. Re-entrant calls from nested
    /// `progress_to_phase` invocations are no-ops.
    fn maybe_auto_progress(&mut self) -> Result<(), CoordinatorError> {
        if self.auto_progressing {
            return Ok(());
        }
        self.auto_progressing = true;
        let outcome = self.auto_progress_loop();
        self.auto_progressing = false;
        outcome
    }

    fn auto_progress_loop(&mut self) -> Result<(), CoordinatorError> {
        while let Some(next) = self.decide_next_phase() {
            self.progress_to_phase(next)?;
        }
        Ok(())
    }

    // ==================== Phase Work ====================

    /// Perform the current phase's work and record its [`PhaseResult`].
    pub fn execute_current_phase(&mut self) -> Result<(), CoordinatorError> {
        let phase = self
            .current_phase()
            .ok_or(CoordinatorError::NoActiveCycle)?;
        let task = self.active_task()?;

        let mut result = match phase {
            Phase::Expand => self.execute_expand(&task),
            Phase::Differentiate => self.execute_differentiate(&task),
            Phase::Refine => self.execute_refine(&task),
            Phase::Retrospect => self.execute_retrospect(&task),
        };

        if phase == Phase::Expand {
            self.run_micro_cycles(&task, &mut result);
        }

        self.store_quietly(
            serde_json::to_value(&result).unwrap_or(Value::Null),
            "PHASE_RESULT",
            phase.as_str(),
        );
        if let Some(state) = self.state.as_mut() {
            state.results.insert(phase.as_str().to_string(), result);
        }
        Ok(())
    }

    /// Expand: divergent idea generation from the task's options and
    /// flattened keywords.
    fn execute_expand(&mut self, task: &Task) -> PhaseResult {
        let ideas: Vec<String> = if task.options.is_empty() {
            task.flatten_keywords().into_iter().take(5).collect()
        } else {
            task.options.clone()
        };
        let quality = (ideas.len() as f64 / 5.0).min(1.0);
        debug!(count = ideas.len(), "expand phase generated ideas");

        let result = PhaseResult::new(Phase::Expand, json!({ "ideas": ideas.clone() }))
            .with_quality_score(quality);
        if ideas.is_empty() {
            result
        } else {
            result.mark_complete()
        }
    }

    /// Differentiate: a critical-decision vote over the options.
    ///
    /// A task without explicit options votes over the ideas the Expand
    /// phase generated.
    fn execute_differentiate(&mut self, task: &Task) -> PhaseResult {
        let mut vote_task = task.clone();
        if vote_task.options.is_empty() {
            vote_task.options = self.expanded_ideas();
        }
        let record = self.engine.vote_on_critical_decision(&vote_task);
        let completed = record.status == VoteStatus::Completed;
        let quality = if completed { 0.9 } else { 0.2 };

        let result = PhaseResult::new(
            Phase::Differentiate,
            json!({ "vote": serde_json::to_value(&record).unwrap_or(Value::Null) }),
        )
        .with_quality_score(quality);
        if completed {
            result.mark_complete()
        } else {
            result
        }
    }

    /// Ideas recorded by the Expand phase, if it has executed.
    fn expanded_ideas(&self) -> Vec<String> {
        self.state
            .as_ref()
            .and_then(|state| state.result_for(Phase::Expand))
            .and_then(|result| result.payload.get("ideas"))
            .and_then(Value::as_array)
            .map(|ideas| {
                ideas
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Refine: consensus building; the adopted option becomes the
    /// task's carried-forward solution.
    fn execute_refine(&mut self, task: &Task) -> PhaseResult {
        let consensus = self.engine.build_consensus(task);
        let (quality, complete) = match consensus.status {
            ConsensusStatus::Completed => (0.95, true),
            ConsensusStatus::PartialConsensus => (0.7, true),
            _ => (0.2, false),
        };

        if let Some(decision) = consensus.result.clone() {
            if let Some(state) = self.state.as_mut() {
                state.task.solution = Some(json!({ "decision": decision }));
            }
        }

        let result = PhaseResult::new(
            Phase::Refine,
            json!({ "consensus": serde_json::to_value(&consensus).unwrap_or(Value::Null) }),
        )
        .with_quality_score(quality);
        if complete {
            result.mark_complete()
        } else {
            result
        }
    }

    /// Retrospect: collect learnings from the cycle's execution history.
    fn execute_retrospect(&mut self, task: &Task) -> PhaseResult {
        let (events, decisions) = match self.state.as_ref() {
            Some(state) => (state.history.len(), self.engine.voting_history().len()),
            None => (0, 0),
        };
        let learnings = json!({
            "events_recorded": events,
            "decisions_made": decisions,
            "solution": task.solution.clone().unwrap_or(Value::Null),
        });
        PhaseResult::new(Phase::Retrospect, json!({ "learnings": learnings }))
            .with_quality_score(1.0)
            .mark_complete()
    }

    // ==================== Micro Cycles ====================

    /// Whether `task` should stop recursing into a micro cycle.
    ///
    /// Checks, in order: the host's human override, the depth guard,
    /// granularity, cost/benefit, and existing quality.
    pub fn should_terminate_recursion(&self, task: &Task) -> bool {
        match task.human_override.as_deref() {
            Some("terminate") => return true,
            Some("continue") => return false,
            _ => {}
        }
        if self.recursion_depth + 1 > self.config.recursion.max_depth {
            return true;
        }
        if let Some(score) = task.granularity_score {
            if score < self.config.recursion.granularity_threshold {
                return true;
            }
        }
        let cost = task.context.get("cost").and_then(Value::as_f64);
        let benefit = task.context.get("benefit").and_then(Value::as_f64);
        if let (Some(cost), Some(benefit)) = (cost, benefit) {
            if benefit > 0.0 && cost / benefit > self.config.recursion.cost_benefit_ratio {
                return true;
            }
        }
        if let Some(quality) = task.context.get("quality_score").and_then(Value::as_f64) {
            if quality >= self.config.recursion.quality_threshold {
                return true;
            }
        }
        false
    }

    /// Run a synchronous micro cycle per eligible subtask.
    ///
    /// A child cycle's internal failure is recorded as an error entry
    /// under the parent's phase result, never propagated.
    fn run_micro_cycles(&mut self, task: &Task, result: &mut PhaseResult) {
        for subtask in &task.subtasks {
            if self.should_terminate_recursion(subtask) {
                debug!(subtask = %subtask.description, "recursion terminated for subtask");
                continue;
            }

            let mut child = self.build_child();
            if let Some(state) = self.state.as_ref() {
                child.parent = Some((state.cycle_id.clone(), result.phase));
            }

            match child
                .start_cycle(subtask.clone())
                .and_then(|_| child.generate_final_report())
            {
                Ok(report) => {
                    info!(child = %report.cycle_id, "micro cycle completed");
                    result.micro_cycle_results.insert(
                        report.cycle_id.clone(),
                        serde_json::to_value(&report).unwrap_or(Value::Null),
                    );
                    if let Some(state) = self.state.as_mut() {
                        state.child_cycles.push(ChildCycleSummary {
                            cycle_id: report.cycle_id.clone(),
                            task_description: subtask.description.clone(),
                            recursion_depth: child.recursion_depth,
                            status: "completed".to_string(),
                        });
                    }
                }
                Err(err) => {
                    warn!(subtask = %subtask.description, error = %err, "micro cycle failed");
                    result.record_error(format!(
                        "micro cycle for '{}' failed: {err}",
                        subtask.description
                    ));
                }
            }
        }
    }

    /// Build the coordinator for a micro cycle, one nesting level down.
    fn build_child(&self) -> PhaseCoordinator {
        let mut child = match self.child_factory.as_ref() {
            Some(factory) => factory(self),
            None => PhaseCoordinator::new(
                self.config.clone(),
                self.engine.agents().to_vec(),
                Arc::clone(&self.memory),
                Arc::clone(&self.clock),
            ),
        };
        child.recursion_depth = self.recursion_depth + 1;
        if let Some(seed) = self.seed {
            child.engine.reseed(seed);
        }
        child
    }

    // ==================== Memory Wrappers ====================

    /// Store to memory, logging and swallowing failures.
    fn store_quietly(&self, item: Value, item_type: &str, phase: &str) {
        let metadata = self.metadata();
        if let Err(err) = self
            .memory
            .store_with_edrr_phase(item, item_type, phase, &metadata)
        {
            warn!(item_type, phase, error = %err, "memory store failed; continuing");
        }
    }

    /// Retrieve from memory, defaulting to `None` on failure.
    pub fn retrieve_quietly(&self, item_type: &str, phase: &str) -> Option<Value> {
        let metadata = self.metadata();
        match self
            .memory
            .retrieve_with_edrr_phase(item_type, phase, &metadata)
        {
            Ok(found) => found,
            Err(err) => {
                warn!(item_type, phase, error = %err, "memory retrieve failed; using default");
                None
            }
        }
    }

    fn metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        if let Some(state) = self.state.as_ref() {
            metadata.insert("cycle_id".to_string(), json!(state.cycle_id));
        }
        metadata
    }

    // ==================== Helpers ====================

    fn active_task(&self) -> Result<Task, CoordinatorError> {
        self.state
            .as_ref()
            .map(|s| s.task.clone())
            .ok_or(CoordinatorError::NoActiveCycle)
    }

    fn check_dependencies(
        &self,
        current: Option<Phase>,
        target: Phase,
    ) -> Result<(), CoordinatorError> {
        match current {
            None if target == Phase::Expand => Ok(()),
            None => Err(CoordinatorError::DependencyNotMet(format!(
                "cannot enter {target} before Expand"
            ))),
            Some(current) if target.index() == current.index() + 1 => Ok(()),
            Some(current) => Err(CoordinatorError::DependencyNotMet(format!(
                "cannot move from {current} to {target}; phases only advance one step forward"
            ))),
        }
    }
}

impl PhaseRecorder for PhaseCoordinator {
    fn record_expand_result(&mut self, result: &StepResult) {
        self.record_step(Phase::Expand, result);
    }

    fn record_differentiate_result(&mut self, result: &StepResult) {
        self.record_step(Phase::Differentiate, result);
    }

    fn record_refine_result(&mut self, result: &StepResult) {
        self.record_step(Phase::Refine, result);
    }

    fn record_retrospect_result(&mut self, result: &StepResult) {
        self.record_step(Phase::Retrospect, result);
    }

    fn record_consensus_failure(&mut self, phase: Phase, message: &str) {
        warn!(phase = %phase, message, "consensus failure reported to coordinator");
        if let Some(state) = self.state.as_mut() {
            state
                .results
                .entry(phase.as_str().to_string())
                .or_insert_with(|| PhaseResult::new(phase, Value::Null))
                .record_error(message.to_string());
        }
    }
}

impl PhaseCoordinator {
    fn record_step(&mut self, phase: Phase, result: &StepResult) {
        self.store_quietly(result.synthesis.clone(), "REASONING_RESULT", phase.as_str());
        let now = self.clock.now();
        if let Some(state) = self.state.as_mut() {
            state.history.push(ExecutionEvent {
                phase,
                event: "reasoning result recorded".to_string(),
                elapsed: now,
            });
        }
    }
}
