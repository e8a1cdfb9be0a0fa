//! Shared types for the domwatch monitoring engine.
//!
//! Everything here is plain data passed between the check, alert, notify,
//! storage, and server crates. No I/O lives in this crate.

pub mod id;
pub mod types;
