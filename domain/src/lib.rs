//! Domain layer for edrr
//!
//! This crate contains the core business logic, entities, and value objects
//! for the EDRR (Expand, Differentiate, Refine, Retrospect) methodology.
//! It has no dependencies on orchestration or host concerns.
//!
//! # Core Concepts
//!
//! ## EDRR Cycle
//!
//! A cycle is one traversal of the four ordered phases for a task. Phases
//! only move forward; Retrospect is terminal. Macro phases may contain
//! nested micro cycles for finer-grained subtasks.
//!
//! ## Decision Team
//!
//! A roster of expertise-tagged agents holding the five rotating roles
//! (Primus, Worker, Supervisor, Designer, Evaluator). Every critical
//! decision is settled by voting or consensus building, and every outcome
//! is retained as an auditable record.

pub mod core;
pub mod decision;
pub mod phase;
pub mod report;
pub mod task;
pub mod team;

// Re-export commonly used types
pub use core::error::DomainError;
pub use decision::{
    consensus::{ConsensusResult, ConsensusRound, ConsensusStatus, Preferences},
    vote::{VoteMethod, VoteRecord, VoteStatus},
};
pub use phase::{Phase, PhaseResult};
pub use report::{FinalReport, PhaseSummary};
pub use task::{ConsensusParams, Task};
pub use team::{Agent, Role, RoleAssignments};
