//! End-to-end cycle behavior against a real SQLite store, with scripted
//! network checks and a recording notification channel.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domwatch_alert::{AlertPolicy, CooldownGate};
use domwatch_check::{
    CertificateInfo, CheckFailure, DomainChecker, ProbeResult, ProbeStatus, RegistryInfo,
};
use domwatch_common::types::{
    AlertCategory, AlertEvent, CertificateState, CheckKind, CheckOutcome, CheckResult, Domain,
    ExpiryState, RegisterDomainRequest,
};
use domwatch_notify::error::Result as NotifyResult;
use domwatch_notify::{NotificationChannel, NotificationManager};
use domwatch_server::orchestrator::{CycleError, Orchestrator, RetryPolicy};
use domwatch_storage::error::{Result as StorageResult, StorageError};
use domwatch_storage::{ResultStore, SqliteStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ---- doubles ----

struct ScriptedChecker {
    /// Successive probe results; the last one repeats once exhausted.
    probes: Mutex<VecDeque<ProbeResult>>,
    certificate: Mutex<Option<Result<CertificateInfo, CheckFailure>>>,
    registry: Mutex<Option<Result<RegistryInfo, CheckFailure>>>,
    probe_calls: AtomicUsize,
    inspect_calls: AtomicUsize,
    lookup_calls: AtomicUsize,
    probe_delay_ms: u64,
}

impl ScriptedChecker {
    fn new(
        probes: Vec<ProbeResult>,
        certificate: Result<CertificateInfo, CheckFailure>,
        registry: Result<RegistryInfo, CheckFailure>,
    ) -> Self {
        Self {
            probes: Mutex::new(probes.into()),
            certificate: Mutex::new(Some(certificate)),
            registry: Mutex::new(Some(registry)),
            probe_calls: AtomicUsize::new(0),
            inspect_calls: AtomicUsize::new(0),
            lookup_calls: AtomicUsize::new(0),
            probe_delay_ms: 0,
        }
    }
}

#[async_trait]
impl DomainChecker for ScriptedChecker {
    async fn probe(&self, _url: &str) -> ProbeResult {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.probe_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.probe_delay_ms)).await;
        }
        let mut probes = self.probes.lock().unwrap();
        if probes.len() > 1 {
            probes.pop_front().unwrap()
        } else {
            probes.front().cloned().expect("probe script exhausted")
        }
    }

    async fn inspect(&self, _hostname: &str) -> Result<CertificateInfo, CheckFailure> {
        self.inspect_calls.fetch_add(1, Ordering::SeqCst);
        self.certificate
            .lock()
            .unwrap()
            .clone()
            .expect("certificate script missing")
    }

    async fn lookup(&self, _hostname: &str) -> Result<RegistryInfo, CheckFailure> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.registry
            .lock()
            .unwrap()
            .clone()
            .expect("registry script missing")
    }
}

struct RecordingChannel {
    events: Arc<Mutex<Vec<AlertEvent>>>,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, alert: &AlertEvent) -> NotifyResult<()> {
        self.events.lock().unwrap().push(alert.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

/// Store whose appends always fail, for the persistence-is-fatal property.
struct BrokenStore;

impl ResultStore for BrokenStore {
    fn register_domain(&self, _req: &RegisterDomainRequest) -> StorageResult<Domain> {
        Err(broken())
    }
    fn get_domain(&self, _id: &str) -> StorageResult<Option<Domain>> {
        Ok(None)
    }
    fn list_domains(&self) -> StorageResult<Vec<Domain>> {
        Ok(Vec::new())
    }
    fn domains_due_for_check(&self, _default_interval_secs: u64) -> StorageResult<Vec<Domain>> {
        Ok(Vec::new())
    }
    fn update_last_checked_at(&self, _domain_id: &str, _ts: DateTime<Utc>) -> StorageResult<()> {
        Ok(())
    }
    fn delete_domain(&self, _id: &str) -> StorageResult<bool> {
        Ok(false)
    }
    fn append_check_result(&self, _result: &CheckResult) -> StorageResult<()> {
        Err(broken())
    }
    fn latest_results(&self, _domain_id: &str, _limit: usize) -> StorageResult<Vec<CheckResult>> {
        Ok(Vec::new())
    }
    fn upsert_certificate_state(&self, _state: &CertificateState) -> StorageResult<()> {
        Ok(())
    }
    fn get_certificate_state(&self, _domain_id: &str) -> StorageResult<Option<CertificateState>> {
        Ok(None)
    }
    fn upsert_expiry_state(&self, _state: &ExpiryState) -> StorageResult<()> {
        Ok(())
    }
    fn get_expiry_state(&self, _domain_id: &str) -> StorageResult<Option<ExpiryState>> {
        Ok(None)
    }
    fn record_alert(&self, _event: &AlertEvent) -> StorageResult<()> {
        Ok(())
    }
    fn last_alert_fired(
        &self,
        _domain_id: &str,
        _category: AlertCategory,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        Ok(None)
    }
    fn recent_alerts(&self, _domain_id: &str, _limit: usize) -> StorageResult<Vec<AlertEvent>> {
        Ok(Vec::new())
    }
}

fn broken() -> StorageError {
    StorageError::Corrupt {
        column: "simulated",
        value: "store unavailable".to_string(),
    }
}

// ---- fixtures ----

fn up_probe() -> ProbeResult {
    ProbeResult {
        status: ProbeStatus::Up,
        status_code: Some(200),
        latency_ms: Some(35.2),
        final_url: Some("https://example.com/".to_string()),
        error: None,
    }
}

fn down_probe() -> ProbeResult {
    ProbeResult {
        status: ProbeStatus::Down,
        status_code: None,
        latency_ms: None,
        final_url: None,
        error: Some(CheckFailure::Timeout("connect timed out".to_string())),
    }
}

fn cert_with_days(days: i64) -> CertificateInfo {
    let now = Utc::now();
    CertificateInfo {
        issuer: Some("CN=Test CA".to_string()),
        valid_from: now - Duration::days(30),
        valid_until: now + Duration::days(days),
        days_remaining: days,
    }
}

fn registry_ok() -> RegistryInfo {
    RegistryInfo {
        expiration_date: Some(Utc::now() + Duration::days(400)),
        registrar: Some("Test Registrar".to_string()),
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<SqliteStore>,
    checker: Arc<ScriptedChecker>,
    orchestrator: Arc<Orchestrator>,
    notifications: Arc<Mutex<Vec<AlertEvent>>>,
    domain: Domain,
}

fn harness(checker: ScriptedChecker) -> Harness {
    harness_with(checker, RetryPolicy {
        max_attempts: 3,
        backoff_secs: 0,
    })
}

fn harness_with(checker: ScriptedChecker, retry: RetryPolicy) -> Harness {
    domwatch_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::new(dir.path()).unwrap());
    let domain = store
        .register_domain(&RegisterDomainRequest {
            url: "https://example.com".to_string(),
            name: None,
            owner_id: None,
            check_interval_secs: None,
        })
        .unwrap();

    let notifications = Arc::new(Mutex::new(Vec::new()));
    let notifier = Arc::new(NotificationManager::new(vec![Box::new(RecordingChannel {
        events: notifications.clone(),
    })]));

    let checker = Arc::new(checker);
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        checker.clone(),
        notifier,
        AlertPolicy::default(),
        CooldownGate::new(86400),
        retry,
    ));

    Harness {
        _dir: dir,
        store,
        checker,
        orchestrator,
        notifications,
        domain,
    }
}

// ---- tests ----

#[tokio::test]
async fn down_site_short_circuits_and_alerts() {
    let h = harness(ScriptedChecker::new(
        vec![down_probe()],
        Ok(cert_with_days(90)),
        Ok(registry_ok()),
    ));

    let report = h.orchestrator.run_cycle(&h.domain).await.unwrap();

    assert_eq!(report.reachability.status, ProbeStatus::Down);
    assert!(report.certificate.is_none());
    assert!(report.expiry.is_none());
    assert_eq!(report.results_appended, 1);
    assert_eq!(report.alerts_fired.len(), 1);
    assert_eq!(report.alerts_fired[0].category, AlertCategory::SiteDown);

    // Certificate and expiry checks never ran.
    assert_eq!(h.checker.inspect_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.checker.lookup_calls.load(Ordering::SeqCst), 0);

    // DOWN verdict took all three probe attempts.
    assert_eq!(h.checker.probe_calls.load(Ordering::SeqCst), 3);

    // History: exactly one row, down, with cause and no latency.
    let results = h.store.latest_results(&h.domain.id, 10).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind, CheckKind::Reachability);
    assert_eq!(results[0].outcome, CheckOutcome::Down);
    assert!(results[0].error.as_deref().unwrap().contains("timeout"));
    assert!(results[0].latency_ms.is_none());

    assert_eq!(h.notifications.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn up_cycle_appends_one_result_per_stage() {
    let h = harness(ScriptedChecker::new(
        vec![up_probe()],
        Ok(cert_with_days(90)),
        Ok(registry_ok()),
    ));

    let report = h.orchestrator.run_cycle(&h.domain).await.unwrap();

    assert_eq!(report.results_appended, 3);
    assert!(report.alerts_fired.is_empty());
    assert_eq!(h.checker.probe_calls.load(Ordering::SeqCst), 1);

    let results = h.store.latest_results(&h.domain.id, 10).unwrap();
    assert_eq!(results.len(), 3);
    let mut kinds: Vec<CheckKind> = results.iter().map(|r| r.kind).collect();
    kinds.sort_by_key(|k| k.to_string());
    assert_eq!(
        kinds,
        vec![CheckKind::Certificate, CheckKind::Expiry, CheckKind::Reachability]
    );

    let cert_state = h.store.get_certificate_state(&h.domain.id).unwrap().unwrap();
    assert_eq!(cert_state.days_remaining, 90);
    assert_eq!(cert_state.issuer.as_deref(), Some("CN=Test CA"));

    let expiry_state = h.store.get_expiry_state(&h.domain.id).unwrap().unwrap();
    assert!(expiry_state.expiration_date.is_some());

    let updated = h.store.get_domain(&h.domain.id).unwrap().unwrap();
    assert!(updated.last_checked_at.is_some());
}

#[tokio::test]
async fn probe_retry_recovers_before_final_verdict() {
    let h = harness(ScriptedChecker::new(
        vec![down_probe(), up_probe()],
        Ok(cert_with_days(90)),
        Ok(registry_ok()),
    ));

    let report = h.orchestrator.run_cycle(&h.domain).await.unwrap();

    assert_eq!(report.reachability.status, ProbeStatus::Up);
    assert_eq!(h.checker.probe_calls.load(Ordering::SeqCst), 2);
    // Recovery means the full cycle ran.
    assert_eq!(report.results_appended, 3);
    assert!(h.notifications.lock().unwrap().is_empty());
}

#[tokio::test]
async fn expiring_certificate_alert_is_deduped_across_cycles() {
    let h = harness(ScriptedChecker::new(
        vec![up_probe()],
        Ok(cert_with_days(3)),
        Ok(registry_ok()),
    ));

    let first = h.orchestrator.run_cycle(&h.domain).await.unwrap();
    assert_eq!(first.alerts_fired.len(), 1);
    assert_eq!(
        first.alerts_fired[0].category,
        AlertCategory::CertificateExpiring
    );
    assert_eq!(first.alerts_fired[0].value, Some(3));

    let second = h.orchestrator.run_cycle(&h.domain).await.unwrap();
    // Suppressed within the cooldown window...
    assert!(second.alerts_fired.is_empty());
    assert_eq!(h.notifications.lock().unwrap().len(), 1);
    // ...but the second cycle's results were still persisted.
    let results = h.store.latest_results(&h.domain.id, 10).unwrap();
    assert_eq!(results.len(), 6);
}

#[tokio::test]
async fn expired_certificate_completes_with_negative_days() {
    let h = harness(ScriptedChecker::new(
        vec![up_probe()],
        Ok(cert_with_days(-3)),
        Ok(registry_ok()),
    ));

    let report = h.orchestrator.run_cycle(&h.domain).await.unwrap();

    // The stage completed; it is not an error outcome.
    let results = h.store.latest_results(&h.domain.id, 10).unwrap();
    let cert_row = results
        .iter()
        .find(|r| r.kind == CheckKind::Certificate)
        .unwrap();
    assert_eq!(cert_row.outcome, CheckOutcome::Up);
    assert_eq!(cert_row.days_remaining, Some(-3));

    let state = h.store.get_certificate_state(&h.domain.id).unwrap().unwrap();
    assert_eq!(state.days_remaining, -3);

    // Expired fires a critical certificate alert on first occurrence.
    assert_eq!(report.alerts_fired.len(), 1);
    assert_eq!(
        report.alerts_fired[0].category,
        AlertCategory::CertificateExpiring
    );
}

#[tokio::test]
async fn certificate_failure_is_recorded_but_cycle_continues() {
    let h = harness(ScriptedChecker::new(
        vec![up_probe()],
        Err(CheckFailure::Tls("handshake refused".to_string())),
        Ok(registry_ok()),
    ));

    let report = h.orchestrator.run_cycle(&h.domain).await.unwrap();

    assert_eq!(report.results_appended, 3);
    assert!(report.alerts_fired.is_empty());
    // No stale snapshot was written.
    assert!(h.store.get_certificate_state(&h.domain.id).unwrap().is_none());

    let results = h.store.latest_results(&h.domain.id, 10).unwrap();
    let cert_row = results
        .iter()
        .find(|r| r.kind == CheckKind::Certificate)
        .unwrap();
    assert_eq!(cert_row.outcome, CheckOutcome::Error);
    assert!(cert_row.error.as_deref().unwrap().contains("handshake"));
}

#[tokio::test]
async fn registry_failure_never_alerts() {
    let h = harness(ScriptedChecker::new(
        vec![up_probe()],
        Ok(cert_with_days(90)),
        Err(CheckFailure::Registry("whois unreachable".to_string())),
    ));

    let report = h.orchestrator.run_cycle(&h.domain).await.unwrap();

    assert!(report.alerts_fired.is_empty());
    assert!(h.notifications.lock().unwrap().is_empty());

    let results = h.store.latest_results(&h.domain.id, 10).unwrap();
    let expiry_row = results.iter().find(|r| r.kind == CheckKind::Expiry).unwrap();
    assert_eq!(expiry_row.outcome, CheckOutcome::Error);
    assert!(expiry_row.error.as_deref().unwrap().contains("whois"));
}

#[tokio::test]
async fn registry_without_expiry_field_is_a_success() {
    let h = harness(ScriptedChecker::new(
        vec![up_probe()],
        Ok(cert_with_days(90)),
        Ok(RegistryInfo {
            expiration_date: None,
            registrar: None,
        }),
    ));

    h.orchestrator.run_cycle(&h.domain).await.unwrap();

    let results = h.store.latest_results(&h.domain.id, 10).unwrap();
    let expiry_row = results.iter().find(|r| r.kind == CheckKind::Expiry).unwrap();
    assert_eq!(expiry_row.outcome, CheckOutcome::Up);
    assert!(expiry_row.error.is_none());
    assert!(expiry_row.days_remaining.is_none());
}

#[tokio::test]
async fn persistence_failure_fails_the_cycle() {
    domwatch_common::id::init(1, 1);
    let checker = Arc::new(ScriptedChecker::new(
        vec![up_probe()],
        Ok(cert_with_days(90)),
        Ok(registry_ok()),
    ));
    let notifier = Arc::new(NotificationManager::new(Vec::new()));
    let orchestrator = Orchestrator::new(
        Arc::new(BrokenStore),
        checker,
        notifier,
        AlertPolicy::default(),
        CooldownGate::new(86400),
        RetryPolicy {
            max_attempts: 1,
            backoff_secs: 0,
        },
    );

    let now = Utc::now();
    let domain = Domain {
        id: "d-1".to_string(),
        name: "example.com".to_string(),
        url: "https://example.com".to_string(),
        owner_id: None,
        enabled: true,
        check_interval_secs: None,
        last_checked_at: None,
        created_at: now,
        updated_at: now,
    };

    let err = orchestrator.run_cycle(&domain).await.unwrap_err();
    assert!(matches!(err, CycleError::Persistence(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_cycle_for_same_domain_is_rejected() {
    let mut checker = ScriptedChecker::new(
        vec![up_probe()],
        Ok(cert_with_days(90)),
        Ok(registry_ok()),
    );
    checker.probe_delay_ms = 200;
    let h = harness(checker);

    let orchestrator = h.orchestrator.clone();
    let domain = h.domain.clone();
    let first = tokio::spawn(async move { orchestrator.run_cycle(&domain).await });

    // Let the first cycle get into its probe.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let second = h.orchestrator.run_cycle(&h.domain).await;
    assert!(matches!(second, Err(CycleError::AlreadyRunning(_))));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.results_appended, 3);
}
