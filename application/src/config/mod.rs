//! Application configuration
//!
//! Configuration is plain data with builder-style `with_*` methods;
//! hosts typically deserialize it from their own config layer.

mod coordinator_config;
mod loop_params;

pub use coordinator_config::{CoordinatorConfig, RecursionLimits};
pub use loop_params::LoopParams;
