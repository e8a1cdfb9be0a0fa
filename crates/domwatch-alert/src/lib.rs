//! Alert policy for the monitoring engine.
//!
//! [`AlertPolicy`] decides whether a cycle's observations cross an alert
//! threshold; [`CooldownGate`] decides whether a crossed threshold is a new
//! alert or a repeat of an ongoing condition. The last-fired timestamp the
//! gate consumes comes from the result store, so suppression survives
//! process restarts and the orchestrator stays stateless across cycles.

pub mod cooldown;
pub mod policy;

#[cfg(test)]
mod tests;

pub use cooldown::CooldownGate;
pub use policy::AlertPolicy;
