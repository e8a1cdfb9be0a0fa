use crate::{AlertPolicy, CooldownGate};
use chrono::{Duration, Utc};
use domwatch_check::{CheckFailure, ProbeResult, ProbeStatus};
use domwatch_common::types::{AlertCategory, Domain, Severity};

fn make_domain(url: &str) -> Domain {
    let now = Utc::now();
    Domain {
        id: domwatch_common::id::next_id(),
        name: "example".to_string(),
        url: url.to_string(),
        owner_id: None,
        enabled: true,
        check_interval_secs: None,
        last_checked_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn down_probe(error: CheckFailure) -> ProbeResult {
    ProbeResult {
        status: ProbeStatus::Down,
        status_code: None,
        latency_ms: None,
        final_url: None,
        error: Some(error),
    }
}

#[test]
fn up_probe_does_not_alert() {
    let policy = AlertPolicy::default();
    let domain = make_domain("https://example.com");
    let probe = ProbeResult {
        status: ProbeStatus::Up,
        status_code: Some(200),
        latency_ms: Some(42.0),
        final_url: Some("https://example.com/".to_string()),
        error: None,
    };
    assert!(policy.evaluate_site_down(&domain, &probe, Utc::now()).is_none());
}

#[test]
fn down_probe_alerts_with_cause() {
    let policy = AlertPolicy::default();
    let domain = make_domain("https://example.com");
    let probe = down_probe(CheckFailure::Timeout("connect timed out".to_string()));

    let event = policy
        .evaluate_site_down(&domain, &probe, Utc::now())
        .unwrap();
    assert_eq!(event.category, AlertCategory::SiteDown);
    assert_eq!(event.severity, Severity::Critical);
    assert!(event.message.contains("https://example.com"));
    assert!(event.message.contains("timeout"));
}

#[test]
fn server_error_without_taxonomy_reports_status_code() {
    let policy = AlertPolicy::default();
    let domain = make_domain("https://example.com");
    let probe = ProbeResult {
        status: ProbeStatus::Down,
        status_code: Some(503),
        latency_ms: Some(10.0),
        final_url: None,
        error: None,
    };
    let event = policy
        .evaluate_site_down(&domain, &probe, Utc::now())
        .unwrap();
    assert!(event.message.contains("503"));
}

#[test]
fn certificate_above_thresholds_is_quiet() {
    let policy = AlertPolicy::default();
    let domain = make_domain("https://example.com");
    assert!(policy
        .evaluate_certificate(&domain, "example.com", 90, Utc::now())
        .is_none());
    // Boundary: exactly at the warning threshold does not fire.
    assert!(policy
        .evaluate_certificate(&domain, "example.com", 30, Utc::now())
        .is_none());
}

#[test]
fn certificate_below_warning_threshold_warns() {
    let policy = AlertPolicy::default();
    let domain = make_domain("https://example.com");
    let event = policy
        .evaluate_certificate(&domain, "example.com", 20, Utc::now())
        .unwrap();
    assert_eq!(event.severity, Severity::Warning);
    assert_eq!(event.value, Some(20));
    assert!(event.message.contains("expires in 20 days"));
}

#[test]
fn certificate_below_critical_threshold_is_critical() {
    let policy = AlertPolicy::default();
    let domain = make_domain("https://example.com");
    let event = policy
        .evaluate_certificate(&domain, "example.com", 5, Utc::now())
        .unwrap();
    assert_eq!(event.severity, Severity::Critical);
}

#[test]
fn expired_certificate_is_critical_with_negative_days() {
    let policy = AlertPolicy::default();
    let domain = make_domain("https://expired.badssl.com");
    let event = policy
        .evaluate_certificate(&domain, "expired.badssl.com", -3, Utc::now())
        .unwrap();
    assert_eq!(event.severity, Severity::Critical);
    assert_eq!(event.value, Some(-3));
    assert!(event.message.contains("expired 3 days ago"));
}

#[test]
fn cooldown_suppresses_within_window() {
    let gate = CooldownGate::new(3600);
    let now = Utc::now();

    assert!(!gate.is_suppressed(None, now));
    assert!(gate.is_suppressed(Some(now - Duration::seconds(10)), now));
    assert!(gate.is_suppressed(Some(now - Duration::seconds(3599)), now));
    assert!(!gate.is_suppressed(Some(now - Duration::seconds(3600)), now));
    assert!(!gate.is_suppressed(Some(now - Duration::hours(2)), now));
}
