use chrono::{DateTime, Utc};
use domwatch_check::ProbeResult;
use domwatch_common::id;
use domwatch_common::types::{AlertCategory, AlertEvent, Domain, Severity};

/// Thresholds that decide when a cycle's observations become alerts.
///
/// Certificate expiry uses two levels: warning (default 30 days) and
/// critical (default 7 days). Both levels share the
/// `certificate_expiring` category, so the cooldown gate treats an
/// escalation within the window like any other repeat.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    /// Fire a warning-level alert when days-remaining drops below this.
    pub cert_warning_days: i64,
    /// Fire a critical-level alert when days-remaining drops below this.
    pub cert_critical_days: i64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            cert_warning_days: 30,
            cert_critical_days: 7,
        }
    }
}

impl AlertPolicy {
    /// A DOWN probe verdict is always alert-eligible.
    pub fn evaluate_site_down(
        &self,
        domain: &Domain,
        probe: &ProbeResult,
        now: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        if !probe.is_down() {
            return None;
        }

        let cause = match (&probe.error, probe.status_code) {
            (Some(err), _) => err.to_string(),
            (None, Some(code)) => format!("server responded with status {code}"),
            (None, None) => "unreachable".to_string(),
        };

        Some(AlertEvent {
            id: id::next_id(),
            domain_id: domain.id.clone(),
            domain_name: domain.name.clone(),
            category: AlertCategory::SiteDown,
            severity: Severity::Critical,
            message: format!("Website {} is currently not reachable: {cause}", domain.url),
            value: None,
            fired_at: now,
        })
    }

    /// Alert when days-remaining falls below a threshold. Negative values
    /// (already expired) are always critical.
    pub fn evaluate_certificate(
        &self,
        domain: &Domain,
        hostname: &str,
        days_remaining: i64,
        now: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        let severity = if days_remaining < self.cert_critical_days {
            Severity::Critical
        } else if days_remaining < self.cert_warning_days {
            Severity::Warning
        } else {
            return None;
        };

        let message = if days_remaining < 0 {
            format!(
                "The SSL certificate for {hostname} expired {} days ago",
                -days_remaining
            )
        } else {
            format!("The SSL certificate for {hostname} expires in {days_remaining} days")
        };

        Some(AlertEvent {
            id: id::next_id(),
            domain_id: domain.id.clone(),
            domain_name: domain.name.clone(),
            category: AlertCategory::CertificateExpiring,
            severity,
            message,
            value: Some(days_remaining),
            fired_at: now,
        })
    }
}
