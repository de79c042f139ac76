//! Ports consumed by the coordinator, decision engine, and reasoning loop
//!
//! Implementations live in the host process. Each port ships a default
//! or test double so the core can run standalone.

pub mod clock;
pub mod memory;
pub mod reasoning;
pub mod recorder;
