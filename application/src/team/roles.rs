//! Role assignment and Primus rotation
//!
//! Primus selection scores every agent (the incumbent included) against
//! the task's keywords with a doubled bonus for the entering phase's own
//! keyword list. Fairness comes from the served flags: ties prefer an
//! agent who has not yet held Primus, and once the whole roster has
//! served the flags reset and rotation restarts.

use super::{DecisionEngine, RoleAssigner};
use edrr_domain::{DomainError, Phase, Role, RoleAssignments, Task};
use tracing::debug;

/// Non-Primus role priority when entering each phase.
fn role_order(phase: Phase) -> [Role; 4] {
    match phase {
        Phase::Expand => [Role::Designer, Role::Worker, Role::Supervisor, Role::Evaluator],
        Phase::Differentiate => [Role::Evaluator, Role::Supervisor, Role::Designer, Role::Worker],
        Phase::Refine => [Role::Worker, Role::Supervisor, Role::Evaluator, Role::Designer],
        Phase::Retrospect => [Role::Evaluator, Role::Supervisor, Role::Designer, Role::Worker],
    }
}

impl DecisionEngine {
    /// Reset served flags once every agent has held Primus.
    fn reset_rotation_if_exhausted(&mut self) {
        if !self.agents().is_empty() && self.agents().iter().all(|a| a.has_been_primus) {
            debug!("all agents have served as Primus; resetting rotation");
            for agent in self.agents_mut() {
                agent.has_been_primus = false;
            }
        }
    }

    fn install_primus(&mut self, index: usize) -> Result<String, DomainError> {
        let name = self.agents()[index].name.clone();
        self.roles_mut().clear();
        for (i, agent) in self.agents_mut().iter_mut().enumerate() {
            if i == index {
                agent.has_been_primus = true;
                agent.take_role(Some(Role::Primus));
            } else {
                agent.take_role(None);
            }
        }
        self.roles_mut().assign(Role::Primus, name.clone())?;
        self.set_primus_index(Some(index));
        Ok(name)
    }
}

impl RoleAssigner for DecisionEngine {
    fn select_primus_by_expertise(
        &mut self,
        phase: Phase,
        task: &Task,
    ) -> Result<String, DomainError> {
        if self.agents().is_empty() {
            return Err(DomainError::NoAgents);
        }
        self.reset_rotation_if_exhausted();

        let keywords = task.flatten_keywords();
        let scores: Vec<usize> = self
            .agents()
            .iter()
            .map(|agent| Self::phase_expertise_score(agent, phase, &keywords))
            .collect();
        let best = *scores.iter().max().unwrap_or(&0);

        // Among the top scorers, prefer one who has not yet served.
        let tied: Vec<usize> = (0..scores.len()).filter(|&i| scores[i] == best).collect();
        let chosen = tied
            .iter()
            .copied()
            .find(|&i| !self.agents()[i].has_been_primus)
            .unwrap_or(tied[0]);

        let name = self.install_primus(chosen)?;
        debug!(primus = %name, phase = %phase, score = best, "selected Primus by expertise");
        Ok(name)
    }

    fn assign_roles_for_phase(
        &mut self,
        phase: Phase,
        task: &Task,
    ) -> Result<RoleAssignments, DomainError> {
        let primus = self.select_primus_by_expertise(phase, task)?;

        let keywords = task.flatten_keywords();
        let mut ranked: Vec<(usize, usize)> = self
            .agents()
            .iter()
            .enumerate()
            .filter(|(_, agent)| agent.name != primus)
            .map(|(i, agent)| (i, Self::phase_expertise_score(agent, phase, &keywords)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut free: Vec<Role> = role_order(phase).to_vec();
        for (index, score) in ranked {
            // No keyword match at all falls back to Worker when open.
            let role = if score == 0 && free.contains(&Role::Worker) {
                free.retain(|r| *r != Role::Worker);
                Some(Role::Worker)
            } else if free.is_empty() {
                None
            } else {
                Some(free.remove(0))
            };

            let name = self.agents()[index].name.clone();
            if let Some(role) = role {
                self.roles_mut().assign(role, name)?;
            }
            self.agents_mut()[index].take_role(role);
        }

        debug!(phase = %phase, assigned = self.roles().len(), "assigned phase roles");
        Ok(self.roles().clone())
    }

    fn rotate_primus(&mut self) -> Result<String, DomainError> {
        if self.agents().is_empty() {
            return Err(DomainError::NoAgents);
        }
        self.reset_rotation_if_exhausted();

        let len = self.agents().len();
        let start = self.primus_index().map(|i| i + 1).unwrap_or(0);
        let chosen = (0..len)
            .map(|offset| (start + offset) % len)
            .find(|&i| !self.agents()[i].has_been_primus)
            .unwrap_or(start % len);

        let name = self.install_primus(chosen)?;
        debug!(primus = %name, "rotated Primus");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edrr_domain::Agent;

    fn team() -> Vec<Agent> {
        vec![
            Agent::new("ada").with_expertise(["brainstorming", "creativity"]),
            Agent::new("grace").with_expertise(["analysis", "evaluation"]),
            Agent::new("alan").with_expertise(["coding", "implementation"]),
            Agent::new("edsger").with_expertise(["documentation", "reflection"]),
        ]
    }

    #[test]
    fn test_primus_follows_phase_expertise() {
        let task = Task::new("refine the architecture proposal");
        let mut engine = DecisionEngine::new(team()).with_seed(3);

        let expand = engine.select_primus_by_expertise(Phase::Expand, &task).unwrap();
        assert_eq!(expand, "ada");

        let refine = engine.select_primus_by_expertise(Phase::Refine, &task).unwrap();
        assert_eq!(refine, "alan");

        let retro = engine
            .select_primus_by_expertise(Phase::Retrospect, &task)
            .unwrap();
        assert_eq!(retro, "edsger");
    }

    #[test]
    fn test_selection_ties_prefer_unserved_agent() {
        let agents = vec![
            Agent::new("a").with_expertise(["analysis"]),
            Agent::new("b").with_expertise(["analysis"]),
        ];
        let task = Task::new("compare the two designs");
        let mut engine = DecisionEngine::new(agents).with_seed(9);

        let first = engine
            .select_primus_by_expertise(Phase::Differentiate, &task)
            .unwrap();
        let second = engine
            .select_primus_by_expertise(Phase::Differentiate, &task)
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_rotation_serves_everyone_once_then_restarts() {
        let mut engine = DecisionEngine::new(team()).with_seed(1);
        let n = engine.agents().len();

        let mut served = Vec::new();
        for _ in 0..n {
            served.push(engine.rotate_primus().unwrap());
        }
        let mut unique = served.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), n);

        // One more call restarts the rotation from scratch.
        let again = engine.rotate_primus().unwrap();
        assert!(served.contains(&again));
        assert_eq!(
            engine.agents().iter().filter(|a| a.has_been_primus).count(),
            1
        );
    }

    #[test]
    fn test_no_agent_holds_two_roles() {
        let task = Task::new("explore approaches to the caching problem");
        let mut engine = DecisionEngine::new(team()).with_seed(2);
        let roles = engine.assign_roles_for_phase(Phase::Expand, &task).unwrap();

        let mut names: Vec<&str> = roles.iter().map(|(_, name)| name).collect();
        names.sort();
        let before = names.len();
        names.dedup();
        assert_eq!(names.len(), before);
        assert_eq!(roles.len(), 4);
    }

    #[test]
    fn test_unmatched_agent_falls_back_to_worker() {
        let agents = vec![
            Agent::new("ada").with_expertise(["brainstorming"]),
            Agent::new("zeno").with_expertise(["quantum chromodynamics"]),
        ];
        let task = Task::new("explore ideas for onboarding");
        let mut engine = DecisionEngine::new(agents).with_seed(4);

        let roles = engine.assign_roles_for_phase(Phase::Expand, &task).unwrap();
        assert_eq!(roles.primus(), Some("ada"));
        assert_eq!(roles.agent_for(Role::Worker), Some("zeno"));
    }

    #[test]
    fn test_empty_roster_is_an_error() {
        let mut engine = DecisionEngine::new(Vec::new());
        assert!(engine.rotate_primus().is_err());
        assert!(engine
            .select_primus_by_expertise(Phase::Expand, &Task::new("t"))
            .is_err());
    }
}
