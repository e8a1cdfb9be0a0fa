//! One check cycle for one domain: probe, inspect, look up, persist,
//! decide alerts.
//!
//! Every stage degrades to a recorded outcome; the only failure that
//! aborts a cycle is the store refusing a write, because a check that was
//! not persisted must not be reported as having happened. That failure is
//! still isolated to the one domain's cycle.

use chrono::Utc;
use domwatch_alert::{AlertPolicy, CooldownGate};
use domwatch_check::{CertificateInfo, CheckFailure, DomainChecker, ProbeResult, RegistryInfo};
use domwatch_common::types::{
    hostname_of, AlertEvent, CertificateState, CheckKind, CheckOutcome, CheckResult, Domain,
    ExpiryState,
};
use domwatch_notify::NotificationManager;
use domwatch_storage::error::StorageError;
use domwatch_storage::ResultStore;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bounded retry for the reachability probe. The retry loop lives here,
/// not in the scheduler, so count and delay are explicit parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 60,
        }
    }
}

/// Composite outcome of one cycle, returned to the trigger.
#[derive(Debug)]
pub struct CycleReport {
    pub domain_id: String,
    pub reachability: ProbeResult,
    /// `None` when the stage was skipped (site down short-circuit).
    pub certificate: Option<Result<CertificateInfo, CheckFailure>>,
    pub expiry: Option<Result<RegistryInfo, CheckFailure>>,
    pub alerts_fired: Vec<AlertEvent>,
    pub results_appended: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// The previous cycle for this domain has not finished; the tick is
    /// skipped rather than re-entered.
    #[error("a check cycle for domain {0} is already in flight")]
    AlreadyRunning(String),

    /// The result could not be durably recorded.
    #[error("persistence failure: {0}")]
    Persistence(#[from] StorageError),
}

pub struct Orchestrator {
    store: Arc<dyn ResultStore>,
    checker: Arc<dyn DomainChecker>,
    notifier: Arc<NotificationManager>,
    policy: AlertPolicy,
    gate: CooldownGate,
    retry: RetryPolicy,
    in_flight: Mutex<HashSet<String>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ResultStore>,
        checker: Arc<dyn DomainChecker>,
        notifier: Arc<NotificationManager>,
        policy: AlertPolicy,
        gate: CooldownGate,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            checker,
            notifier,
            policy,
            gate,
            retry,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Runs one full check cycle for `domain`.
    pub async fn run_cycle(&self, domain: &Domain) -> Result<CycleReport, CycleError> {
        let _guard = InFlightGuard::acquire(&self.in_flight, &domain.id)
            .ok_or_else(|| CycleError::AlreadyRunning(domain.id.clone()))?;

        // The store validated the URL at registration; fall back to the raw
        // string if a row predates that check.
        let hostname = hostname_of(&domain.url).unwrap_or_else(|| domain.url.clone());

        let mut report = CycleReport {
            domain_id: domain.id.clone(),
            reachability: self.probe_with_retry(domain).await,
            certificate: None,
            expiry: None,
            alerts_fired: Vec::new(),
            results_appended: 0,
        };

        let now = Utc::now();
        let probe = &report.reachability;
        self.store.append_check_result(&CheckResult {
            id: domwatch_common::id::next_id(),
            domain_id: domain.id.clone(),
            kind: CheckKind::Reachability,
            outcome: if probe.is_down() {
                CheckOutcome::Down
            } else {
                CheckOutcome::Up
            },
            status_code: probe.status_code,
            latency_ms: probe.latency_ms,
            days_remaining: None,
            error: probe.error.as_ref().map(|e| e.to_string()),
            checked_at: now,
        })?;
        report.results_appended += 1;

        if probe.is_down() {
            tracing::warn!(
                domain = %domain.name,
                error = ?probe.error,
                "Site down, skipping certificate and expiry checks this cycle"
            );
            if let Some(event) = self.policy.evaluate_site_down(domain, probe, now) {
                self.dispatch_alert(event, &mut report).await?;
            }
            self.store.update_last_checked_at(&domain.id, now)?;
            return Ok(report);
        }

        // The site answered; certificate and expiry share no state and can
        // run concurrently.
        let (cert, expiry) =
            tokio::join!(self.checker.inspect(&hostname), self.checker.lookup(&hostname));
        let now = Utc::now();

        match &cert {
            Ok(info) => {
                self.store.upsert_certificate_state(&CertificateState {
                    domain_id: domain.id.clone(),
                    issuer: info.issuer.clone(),
                    valid_from: info.valid_from,
                    valid_until: info.valid_until,
                    days_remaining: info.days_remaining,
                    last_checked: now,
                })?;
                self.store.append_check_result(&CheckResult {
                    id: domwatch_common::id::next_id(),
                    domain_id: domain.id.clone(),
                    kind: CheckKind::Certificate,
                    outcome: CheckOutcome::Up,
                    status_code: None,
                    latency_ms: None,
                    days_remaining: Some(info.days_remaining),
                    error: None,
                    checked_at: now,
                })?;
                report.results_appended += 1;

                if let Some(event) =
                    self.policy
                        .evaluate_certificate(domain, &hostname, info.days_remaining, now)
                {
                    self.dispatch_alert(event, &mut report).await?;
                }
            }
            Err(e) => {
                tracing::warn!(domain = %domain.name, error = %e, "Certificate inspection failed");
                self.store.append_check_result(&CheckResult {
                    id: domwatch_common::id::next_id(),
                    domain_id: domain.id.clone(),
                    kind: CheckKind::Certificate,
                    outcome: CheckOutcome::Error,
                    status_code: None,
                    latency_ms: None,
                    days_remaining: None,
                    error: Some(e.to_string()),
                    checked_at: now,
                })?;
                report.results_appended += 1;
            }
        }

        // Registry lookups are best-effort: failures are recorded but never
        // alert, registries being as flaky as they are.
        match &expiry {
            Ok(info) => {
                self.store.upsert_expiry_state(&ExpiryState {
                    domain_id: domain.id.clone(),
                    expiration_date: info.expiration_date,
                    registrar: info.registrar.clone(),
                    last_checked: now,
                })?;
                self.store.append_check_result(&CheckResult {
                    id: domwatch_common::id::next_id(),
                    domain_id: domain.id.clone(),
                    kind: CheckKind::Expiry,
                    outcome: CheckOutcome::Up,
                    status_code: None,
                    latency_ms: None,
                    days_remaining: info.expiration_date.map(|d| (d - now).num_days()),
                    error: None,
                    checked_at: now,
                })?;
                report.results_appended += 1;
            }
            Err(e) => {
                tracing::warn!(domain = %domain.name, error = %e, "Registry expiry lookup failed");
                self.store.append_check_result(&CheckResult {
                    id: domwatch_common::id::next_id(),
                    domain_id: domain.id.clone(),
                    kind: CheckKind::Expiry,
                    outcome: CheckOutcome::Error,
                    status_code: None,
                    latency_ms: None,
                    days_remaining: None,
                    error: Some(e.to_string()),
                    checked_at: now,
                })?;
                report.results_appended += 1;
            }
        }

        self.store.update_last_checked_at(&domain.id, now)?;

        report.certificate = Some(cert);
        report.expiry = Some(expiry);
        Ok(report)
    }

    /// Probe with bounded retry: only a DOWN verdict is retried, and the
    /// last attempt's result is the cycle's verdict.
    async fn probe_with_retry(&self, domain: &Domain) -> ProbeResult {
        let mut probe = self.checker.probe(&domain.url).await;
        let mut attempt = 1;

        while probe.is_down() && attempt < self.retry.max_attempts {
            tracing::info!(
                domain = %domain.name,
                attempt,
                max_attempts = self.retry.max_attempts,
                "Probe returned DOWN, retrying after backoff"
            );
            tokio::time::sleep(Duration::from_secs(self.retry.backoff_secs)).await;
            probe = self.checker.probe(&domain.url).await;
            attempt += 1;
        }

        probe
    }

    /// Record and send an alert unless one of the same (domain, category)
    /// fired within the cooldown window.
    async fn dispatch_alert(
        &self,
        event: AlertEvent,
        report: &mut CycleReport,
    ) -> Result<(), CycleError> {
        let last = self
            .store
            .last_alert_fired(&event.domain_id, event.category)?;

        if self.gate.is_suppressed(last, event.fired_at) {
            tracing::debug!(
                domain = %event.domain_name,
                category = %event.category,
                "Alert suppressed (cooldown window)"
            );
            return Ok(());
        }

        self.store.record_alert(&event)?;
        self.notifier.notify(&event).await;
        report.alerts_fired.push(event);
        Ok(())
    }
}

/// Per-domain mutual exclusion: a tick must not re-enter an in-flight
/// cycle. The entry is removed on drop, panic paths included.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    domain_id: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, domain_id: &str) -> Option<Self> {
        let mut in_flight = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(domain_id.to_string()) {
            return None;
        }
        Some(Self {
            set,
            domain_id: domain_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.domain_id);
    }
}
