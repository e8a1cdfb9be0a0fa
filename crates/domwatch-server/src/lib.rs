//! The monitoring server: configuration, the per-domain check cycle
//! (orchestrator), and the periodic scheduler that drives it.

pub mod config;
pub mod orchestrator;
pub mod scheduler;
