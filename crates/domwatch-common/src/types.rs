use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use domwatch_common::types::Severity;
///
/// let sev: Severity = "warning".parse().unwrap();
/// assert_eq!(sev, Severity::Warning);
/// assert!(Severity::Critical > Severity::Info);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Category of a fired alert. Dedup/cooldown is keyed by (domain, category).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    SiteDown,
    CertificateExpiring,
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCategory::SiteDown => write!(f, "site_down"),
            AlertCategory::CertificateExpiring => write!(f, "certificate_expiring"),
        }
    }
}

impl std::str::FromStr for AlertCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "site_down" => Ok(AlertCategory::SiteDown),
            "certificate_expiring" => Ok(AlertCategory::CertificateExpiring),
            _ => Err(format!("unknown alert category: {s}")),
        }
    }
}

/// A monitored domain (row in the `domains` table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: String,
    /// Display name, defaults to the hostname when not given at registration.
    pub name: String,
    /// Target URL to probe; must parse to a valid hostname.
    pub url: String,
    /// Owning account reference. Account management itself lives elsewhere.
    pub owner_id: Option<String>,
    pub enabled: bool,
    /// Per-domain override of the global check interval.
    pub check_interval_secs: Option<u64>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration request for a new monitored domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDomainRequest {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub check_interval_secs: Option<u64>,
}

/// Extract the hostname from a URL, tolerating a missing scheme
/// (`example.com` is treated as `http://example.com`).
///
/// # Examples
///
/// ```
/// use domwatch_common::types::hostname_of;
///
/// assert_eq!(hostname_of("https://www.google.com/a"), Some("www.google.com".into()));
/// assert_eq!(hostname_of("example.com"), Some("example.com".into()));
/// assert_eq!(hostname_of("not a url"), None);
/// ```
pub fn hostname_of(url: &str) -> Option<String> {
    let candidate = if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    };
    url::Url::parse(&candidate)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Which of the three checks produced a [`CheckResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Reachability,
    Certificate,
    Expiry,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckKind::Reachability => write!(f, "reachability"),
            CheckKind::Certificate => write!(f, "certificate"),
            CheckKind::Expiry => write!(f, "expiry"),
        }
    }
}

impl std::str::FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reachability" => Ok(CheckKind::Reachability),
            "certificate" => Ok(CheckKind::Certificate),
            "expiry" => Ok(CheckKind::Expiry),
            _ => Err(format!("unknown check kind: {s}")),
        }
    }
}

/// Outcome of a single check stage.
///
/// `Up`/`Down` carry the reachability verdict; `Error` marks a stage that
/// could not produce a verdict (TLS handshake failure, WHOIS unreachable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Up,
    Down,
    Error,
}

impl std::fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckOutcome::Up => write!(f, "up"),
            CheckOutcome::Down => write!(f, "down"),
            CheckOutcome::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for CheckOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(CheckOutcome::Up),
            "down" => Ok(CheckOutcome::Down),
            "error" => Ok(CheckOutcome::Error),
            _ => Err(format!("unknown check outcome: {s}")),
        }
    }
}

/// One appended row of check history. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: String,
    pub domain_id: String,
    pub kind: CheckKind,
    pub outcome: CheckOutcome,
    pub status_code: Option<u16>,
    pub latency_ms: Option<f64>,
    pub days_remaining: Option<i64>,
    /// Human-readable cause when the stage failed.
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Latest-wins certificate snapshot for a domain (cache, not history).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateState {
    pub domain_id: String,
    pub issuer: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub days_remaining: i64,
    pub last_checked: DateTime<Utc>,
}

/// Latest-wins registration-expiry snapshot for a domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryState {
    pub domain_id: String,
    pub expiration_date: Option<DateTime<Utc>>,
    pub registrar: Option<String>,
    pub last_checked: DateTime<Utc>,
}

/// A fired alert. Persisted so the cooldown gate can consult the last
/// fired timestamp per (domain, category) across process restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: String,
    pub domain_id: String,
    /// Hostname or display name, used in notification text.
    pub domain_name: String,
    pub category: AlertCategory,
    pub severity: Severity,
    pub message: String,
    /// Numeric context: days remaining for certificate alerts, absent for
    /// site-down alerts.
    pub value: Option<i64>,
    pub fired_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_round_trip() {
        for s in ["info", "warning", "critical"] {
            let sev: Severity = s.parse().unwrap();
            assert_eq!(sev.to_string(), s);
        }
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn category_round_trip() {
        for c in ["site_down", "certificate_expiring"] {
            let cat: AlertCategory = c.parse().unwrap();
            assert_eq!(cat.to_string(), c);
        }
    }

    #[test]
    fn hostname_requires_valid_host() {
        assert_eq!(
            hostname_of("https://expired.badssl.com"),
            Some("expired.badssl.com".to_string())
        );
        assert_eq!(hostname_of("ftp server"), None);
        assert_eq!(hostname_of(""), None);
    }
}
