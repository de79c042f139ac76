//! Final report generation
//!
//! Closes the active cycle into a [`FinalReport`]: one summary per phase
//! attempted (partial and failed phases included with their recorded
//! messages), derived insights and next steps, and the project-value
//! conflict scan over the task's content.

use super::{CoordinatorError, CycleState, PhaseCoordinator};
use edrr_domain::report::{FinalReport, PhaseSummary, RecursionInfo};
use edrr_domain::{Phase, PhaseResult, Task};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

impl PhaseCoordinator {
    /// Aggregate the active cycle into a final report, closing the cycle.
    pub fn generate_final_report(&mut self) -> Result<FinalReport, CoordinatorError> {
        let state = self.state.take().ok_or(CoordinatorError::NoActiveCycle)?;
        let task_summary = serde_json::to_value(&state.task).unwrap_or(Value::Null);
        let mut report = FinalReport::new(&state.cycle_id, &state.task.description, task_summary);

        for phase in Phase::ALL {
            if let Some(result) = state.result_for(phase) {
                let mut summary = PhaseSummary::new(phase);
                summary.quality_score = result.quality_score;
                summary.completed = result.phase_complete;
                summary.errors = result.errors.clone();
                summary.highlights = highlights_for(phase, result);
                report.add_phase_summary(summary);
            }
        }

        report.key_insights = key_insights(&state);
        report.next_steps = next_steps(&state);
        report.value_conflicts = self.scan_value_conflicts(&state.task);
        report.child_cycles = state.child_cycles.clone();
        if let Some((parent_cycle_id, parent_phase)) = self.parent.clone() {
            report.recursion_info = Some(RecursionInfo {
                recursion_depth: self.recursion_depth,
                parent_cycle_id,
                parent_phase,
            });
        }

        let mut metadata = Map::new();
        metadata.insert("cycle_id".to_string(), json!(report.cycle_id));
        if let Err(err) = self.memory.store_with_edrr_phase(
            serde_json::to_value(&report).unwrap_or(Value::Null),
            "FINAL_REPORT",
            Phase::Retrospect.as_str(),
            &metadata,
        ) {
            warn!(error = %err, "failed to persist final report; continuing");
        }

        info!(
            cycle_id = %report.cycle_id,
            phases = report.phase_summaries.len(),
            conflicts = report.value_conflicts.len(),
            "generated final report"
        );
        Ok(report)
    }

    /// Configured project values that appear in the task's keyword set.
    fn scan_value_conflicts(&self, task: &Task) -> Vec<String> {
        let keywords = task.flatten_keywords();
        self.config
            .project_values
            .iter()
            .filter(|value| keywords.contains(&value.to_lowercase()))
            .cloned()
            .collect()
    }
}

fn highlights_for(phase: Phase, result: &PhaseResult) -> Vec<String> {
    let mut highlights = Vec::new();
    match phase {
        Phase::Expand => {
            if let Some(ideas) = result.payload.get("ideas").and_then(Value::as_array) {
                highlights.push(format!("generated {} candidate ideas", ideas.len()));
            }
            if !result.micro_cycle_results.is_empty() {
                highlights.push(format!(
                    "ran {} micro cycles",
                    result.micro_cycle_results.len()
                ));
            }
        }
        Phase::Differentiate => {
            if let Some(winner) = vote_winner(result) {
                highlights.push(format!("team vote selected '{winner}'"));
            }
        }
        Phase::Refine => {
            if let Some(decision) = consensus_decision(result) {
                highlights.push(format!("consensus adopted '{decision}'"));
            }
        }
        Phase::Retrospect => {
            highlights.push("cycle learnings captured".to_string());
        }
    }
    highlights
}

fn key_insights(state: &CycleState) -> Vec<String> {
    let mut insights = Vec::new();
    if let Some(result) = state.result_for(Phase::Differentiate) {
        if let Some(winner) = vote_winner(result) {
            insights.push(format!("the team's critical vote favored '{winner}'"));
        }
    }
    if let Some(result) = state.result_for(Phase::Refine) {
        if let Some(decision) = consensus_decision(result) {
            insights.push(format!("'{decision}' emerged as the consensus direction"));
        }
    }
    let error_count: usize = state.results.values().map(|r| r.errors.len()).sum();
    if error_count > 0 {
        insights.push(format!(
            "{error_count} failure(s) were recorded without aborting the cycle"
        ));
    }
    if insights.is_empty() {
        insights.push("the cycle completed without a decisive outcome".to_string());
    }
    insights
}

fn next_steps(state: &CycleState) -> Vec<String> {
    let mut steps = Vec::new();
    if let Some(Value::Object(solution)) = state.task.solution.as_ref() {
        if let Some(decision) = solution.get("decision").and_then(Value::as_str) {
            steps.push(format!("carry '{decision}' forward into implementation"));
        }
    }
    if state.results.values().any(|r| !r.errors.is_empty()) {
        steps.push("revisit the recorded failures before the next cycle".to_string());
    }
    if state.result_for(Phase::Retrospect).is_none() {
        steps.push("complete the remaining phases".to_string());
    }
    if steps.is_empty() {
        steps.push("schedule a follow-up cycle for the refined task".to_string());
    }
    steps
}

fn vote_winner(result: &PhaseResult) -> Option<String> {
    result
        .payload
        .get("vote")
        .and_then(|vote| vote.get("result"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn consensus_decision(result: &PhaseResult) -> Option<String> {
    result
        .payload
        .get("consensus")
        .and_then(|consensus| consensus.get("result"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use crate::config::CoordinatorConfig;
    use crate::coordinator::PhaseCoordinator;
    use crate::ports::clock::ManualClock;
    use crate::ports::memory::InMemoryStore;
    use edrr_domain::{Agent, Phase, Task};
    use std::sync::Arc;

    fn roster() -> Vec<Agent> {
        vec![
            Agent::new("ada").with_expertise(["brainstorming", "creativity"]),
            Agent::new("grace").with_expertise(["analysis", "evaluation"]),
            Agent::new("alan").with_expertise(["coding", "implementation"]),
            Agent::new("edsger").with_expertise(["documentation", "reflection"]),
        ]
    }

    fn coordinator(config: CoordinatorConfig) -> PhaseCoordinator {
        PhaseCoordinator::new(
            config,
            roster(),
            Arc::new(InMemoryStore::new()),
            Arc::new(ManualClock::new()),
        )
        .with_seed(17)
    }

    #[test]
    fn test_report_covers_every_phase_attempted() {
        let mut coordinator = coordinator(CoordinatorConfig::default());
        coordinator
            .start_cycle(Task::new("choose a storage engine").with_options(["lsm", "btree"]))
            .unwrap();

        let report = coordinator.generate_final_report().unwrap();
        assert_eq!(report.phase_summaries.len(), 4);
        assert!(report.summary_for(Phase::Retrospect).is_some());
        assert!(!report.key_insights.is_empty());
        assert!(!report.next_steps.is_empty());
    }

    #[test]
    fn test_value_conflict_scan() {
        let config = CoordinatorConfig::default().with_project_values(["honesty"]);
        let mut coordinator = coordinator(config);
        coordinator.start_cycle(Task::new("violate honesty")).unwrap();

        let report = coordinator.generate_final_report().unwrap();
        assert_eq!(report.value_conflicts, vec!["honesty".to_string()]);
    }

    #[test]
    fn test_no_conflict_when_values_absent() {
        let config = CoordinatorConfig::default().with_project_values(["honesty"]);
        let mut coordinator = coordinator(config);
        coordinator
            .start_cycle(Task::new("improve the cache layer"))
            .unwrap();

        let report = coordinator.generate_final_report().unwrap();
        assert!(report.value_conflicts.is_empty());
    }

    #[test]
    fn test_micro_cycle_appears_in_report() {
        let subtask = Task::new("refine the index format")
            .with_granularity_score(0.8)
            .with_options(["sparse", "dense"]);
        let task = Task::new("choose a storage engine")
            .with_options(["lsm", "btree"])
            .with_subtask(subtask);

        let mut coordinator = coordinator(CoordinatorConfig::default());
        coordinator.start_cycle(task).unwrap();

        let report = coordinator.generate_final_report().unwrap();
        assert_eq!(report.child_cycles.len(), 1);
        assert_eq!(report.child_cycles[0].recursion_depth, 1);
    }

    #[test]
    fn test_fine_grained_subtask_skips_recursion() {
        let subtask = Task::new("tiny fix").with_granularity_score(0.05);
        let task = Task::new("choose a storage engine")
            .with_options(["lsm", "btree"])
            .with_subtask(subtask);

        let mut coordinator = coordinator(CoordinatorConfig::default());
        coordinator.start_cycle(task).unwrap();

        let report = coordinator.generate_final_report().unwrap();
        assert!(report.child_cycles.is_empty());
    }

    #[test]
    fn test_report_closes_the_cycle() {
        let mut coordinator = coordinator(CoordinatorConfig::default());
        coordinator.start_cycle(Task::new("one-shot")).unwrap();
        coordinator.generate_final_report().unwrap();
        assert!(coordinator.generate_final_report().is_err());
    }
}
