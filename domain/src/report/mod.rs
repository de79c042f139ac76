//! Final report value objects
//!
//! The final report is the user-visible summary of a whole cycle. It
//! always covers every phase attempted, including partial or failed
//! ones with their recorded messages.

use crate::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Summary of one phase for the final report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    pub quality_score: f64,
    pub completed: bool,
    /// Recorded micro-cycle or execution errors, never silently dropped
    pub errors: Vec<String>,
    /// Notable outputs of the phase
    pub highlights: Vec<String>,
}

impl PhaseSummary {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            quality_score: 0.0,
            completed: false,
            errors: Vec::new(),
            highlights: Vec::new(),
        }
    }
}

/// Summary of a nested micro cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildCycleSummary {
    pub cycle_id: String,
    pub task_description: String,
    pub recursion_depth: usize,
    pub status: String,
}

/// Recursion placement of a micro cycle's report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecursionInfo {
    pub recursion_depth: usize,
    pub parent_cycle_id: String,
    pub parent_phase: Phase,
}

/// Final report for one EDRR cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalReport {
    pub title: String,
    pub cycle_id: String,
    pub timestamp: DateTime<Utc>,
    /// The task as the host supplied it
    pub task_summary: Value,
    /// One entry per phase attempted
    pub phase_summaries: BTreeMap<String, PhaseSummary>,
    pub key_insights: Vec<String>,
    pub next_steps: Vec<String>,
    /// Configured project values the task content conflicts with
    pub value_conflicts: Vec<String>,
    /// Set when this report belongs to a micro cycle
    pub recursion_info: Option<RecursionInfo>,
    pub child_cycles: Vec<ChildCycleSummary>,
}

impl FinalReport {
    pub fn new(cycle_id: impl Into<String>, task_description: &str, task_summary: Value) -> Self {
        Self {
            title: format!("EDRR Cycle Report: {task_description}"),
            cycle_id: cycle_id.into(),
            timestamp: Utc::now(),
            task_summary,
            phase_summaries: BTreeMap::new(),
            key_insights: Vec::new(),
            next_steps: Vec::new(),
            value_conflicts: Vec::new(),
            recursion_info: None,
            child_cycles: Vec::new(),
        }
    }

    pub fn summary_for(&self, phase: Phase) -> Option<&PhaseSummary> {
        self.phase_summaries.get(phase.as_str())
    }

    pub fn add_phase_summary(&mut self, summary: PhaseSummary) {
        self.phase_summaries
            .insert(summary.phase.as_str().to_string(), summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_title_and_lookup() {
        let mut report = FinalReport::new("c1", "refactor parser", json!({}));
        assert!(report.title.contains("refactor parser"));

        let mut summary = PhaseSummary::new(Phase::Expand);
        summary.quality_score = 0.8;
        report.add_phase_summary(summary);

        assert!(report.summary_for(Phase::Expand).is_some());
        assert!(report.summary_for(Phase::Refine).is_none());
    }
}
