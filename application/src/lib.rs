//! Application layer for edrr
//!
//! This crate contains the Phase Coordinator, the Team Decision Engine,
//! the Reasoning Loop, and the ports they consume. It depends only on
//! the domain layer; hosts supply the memory implementation and the
//! agent roster.
//!
//! Execution is single-threaded and synchronous: the only suspension
//! points are the backoff waits inside the reasoning loop and the
//! elapsed-time checks in phase gating, both built on the injectable
//! [`Clock`](ports::clock::Clock) so tests never wait on wall-clock.

pub mod config;
pub mod coordinator;
pub mod ports;
pub mod reasoning;
pub mod team;

// Re-export commonly used types
pub use config::{CoordinatorConfig, LoopParams, RecursionLimits};
pub use coordinator::{CoordinatorError, CycleState, PhaseCoordinator};
pub use ports::{
    clock::{Clock, ManualClock, SystemClock},
    memory::{InMemoryStore, MemoryError, MemoryStore},
    reasoning::{ReasoningError, ReasoningStep, StepOutcome, StepResult},
    recorder::{NoRecorder, PhaseRecorder},
};
pub use reasoning::ReasoningLoop;
pub use team::{ConsensusBuilder, ConsensusVote, DecisionEngine, RoleAssigner, Voter};
