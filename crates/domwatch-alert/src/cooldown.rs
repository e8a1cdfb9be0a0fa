use chrono::{DateTime, Duration, Utc};

/// Suppresses repeat alerts for the same (domain, category) within a
/// rolling window. The caller supplies the last-fired timestamp read from
/// the result store; the gate itself holds no per-domain state.
#[derive(Debug, Clone, Copy)]
pub struct CooldownGate {
    cooldown_secs: u64,
}

impl CooldownGate {
    pub fn new(cooldown_secs: u64) -> Self {
        Self { cooldown_secs }
    }

    /// True when an alert fired within the cooldown window and this one
    /// should be suppressed as a duplicate of an ongoing condition.
    pub fn is_suppressed(&self, last_fired: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_fired.is_some_and(|last| now - last < Duration::seconds(self.cooldown_secs as i64))
    }
}
