//! Agents, roles, and role assignments
//!
//! The decision team is a roster of expertise-tagged [`Agent`]s holding
//! the five rotating roles. Exactly one agent is Primus at any time;
//! [`RoleAssignments`] enforces the one-role-per-agent invariant.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A role within the decision team
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Lead and coordinating role; rotates for fairness
    Primus,
    /// Implementation and execution
    Worker,
    /// Oversight and quality control
    Supervisor,
    /// Architecture and planning
    Designer,
    /// Testing and assessment
    Evaluator,
}

impl Role {
    /// All roles, Primus first.
    pub const ALL: [Role; 5] = [
        Role::Primus,
        Role::Worker,
        Role::Supervisor,
        Role::Designer,
        Role::Evaluator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primus => "primus",
            Role::Worker => "worker",
            Role::Supervisor => "supervisor",
            Role::Designer => "designer",
            Role::Evaluator => "evaluator",
        }
    }

    /// Expertise keywords associated with this role for scoring.
    pub fn expertise_keywords(&self) -> &'static [&'static str] {
        match self {
            Role::Primus => &["leadership", "coordination", "decision-making", "strategy"],
            Role::Worker => &["implementation", "coding", "development", "execution"],
            Role::Supervisor => &["oversight", "quality control", "review", "monitoring"],
            Role::Designer => &["design", "architecture", "planning", "creativity"],
            Role::Evaluator => &["testing", "evaluation", "assessment", "analysis"],
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A member of the decision team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique name within the roster
    pub name: String,
    /// Declared skill tags matched against task keywords
    pub expertise: Vec<String>,
    /// Whether this agent has held Primus in the current rotation
    pub has_been_primus: bool,
    /// Role held right now, if any
    pub current_role: Option<Role>,
    /// Role held before the last reassignment
    pub previous_role: Option<Role>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expertise: Vec::new(),
            has_been_primus: false,
            current_role: None,
            previous_role: None,
        }
    }

    pub fn with_expertise<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expertise = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Count how many expertise tags appear in `text` (case-insensitive,
    /// substring match in either direction).
    pub fn expertise_matches(&self, text: &str) -> usize {
        let text = text.to_lowercase();
        self.expertise
            .iter()
            .filter(|tag| {
                let tag = tag.to_lowercase();
                text.contains(&tag) || tag.split_whitespace().any(|w| text.contains(w))
            })
            .count()
    }

    /// Record a role change, remembering the previous one.
    pub fn take_role(&mut self, role: Option<Role>) {
        self.previous_role = self.current_role;
        self.current_role = role;
    }
}

/// Mapping from role to the agent currently holding it
///
/// Maintained by the decision engine on every phase entry and rotation
/// event. Each agent holds at most one role at a time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleAssignments {
    assignments: BTreeMap<Role, String>,
}

impl RoleAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `role` to `agent_name`.
    ///
    /// Fails if the agent already holds a different role.
    pub fn assign(&mut self, role: Role, agent_name: impl Into<String>) -> Result<(), DomainError> {
        let agent_name = agent_name.into();
        if let Some(existing) = self.role_of(&agent_name) {
            if existing != role {
                return Err(DomainError::InvalidRoleMapping(format!(
                    "agent {agent_name} already holds role {existing}"
                )));
            }
        }
        self.assignments.insert(role, agent_name);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.assignments.clear();
    }

    /// Name of the agent holding `role`, if assigned.
    pub fn agent_for(&self, role: Role) -> Option<&str> {
        self.assignments.get(&role).map(String::as_str)
    }

    /// Name of the current Primus, if assigned.
    pub fn primus(&self) -> Option<&str> {
        self.agent_for(Role::Primus)
    }

    /// Role held by `agent_name`, if any.
    pub fn role_of(&self, agent_name: &str) -> Option<Role> {
        self.assignments
            .iter()
            .find(|(_, name)| name.as_str() == agent_name)
            .map(|(role, _)| *role)
    }

    pub fn is_assigned(&self, agent_name: &str) -> bool {
        self.role_of(agent_name).is_some()
    }

    /// Iterate over `(role, agent_name)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.assignments.iter().map(|(r, n)| (*r, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expertise_matches() {
        let agent = Agent::new("ada").with_expertise(["coding", "quality control"]);
        assert_eq!(agent.expertise_matches("improve coding standards"), 1);
        assert_eq!(agent.expertise_matches("quality control for coding"), 2);
        assert_eq!(agent.expertise_matches("documentation"), 0);
    }

    #[test]
    fn test_take_role_tracks_previous() {
        let mut agent = Agent::new("ada");
        agent.take_role(Some(Role::Worker));
        agent.take_role(Some(Role::Primus));
        assert_eq!(agent.current_role, Some(Role::Primus));
        assert_eq!(agent.previous_role, Some(Role::Worker));
    }

    #[test]
    fn test_one_role_per_agent() {
        let mut roles = RoleAssignments::new();
        roles.assign(Role::Primus, "ada").unwrap();
        assert!(roles.assign(Role::Worker, "ada").is_err());
        // Re-assigning the same role is idempotent
        assert!(roles.assign(Role::Primus, "ada").is_ok());
    }

    #[test]
    fn test_primus_lookup() {
        let mut roles = RoleAssignments::new();
        roles.assign(Role::Primus, "ada").unwrap();
        roles.assign(Role::Worker, "grace").unwrap();
        assert_eq!(roles.primus(), Some("ada"));
        assert_eq!(roles.role_of("grace"), Some(Role::Worker));
        assert_eq!(roles.role_of("alan"), None);
    }
}
