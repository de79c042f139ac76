//! Decision records: votes and consensus
//!
//! Every decision the team makes produces an immutable, serializable
//! record retained for audit inside the owning cycle's results.

pub mod consensus;
pub mod vote;

pub use consensus::{ConsensusResult, ConsensusRound, ConsensusStatus};
pub use vote::{VoteMethod, VoteRecord, VoteStatus};
