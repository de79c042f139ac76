//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("No agents in team")]
    NoAgents,

    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error("Invalid role mapping: {0}")]
    InvalidRoleMapping(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(DomainError::NoAgents.to_string(), "No agents in team");
        assert_eq!(
            DomainError::UnknownPhase("polish".to_string()).to_string(),
            "Unknown phase: polish"
        );
    }
}
