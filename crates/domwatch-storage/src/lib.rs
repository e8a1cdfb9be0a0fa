//! Persistence layer for the monitoring engine.
//!
//! One SQLite database (WAL mode) holds the registered domains, the
//! append-only check history, the latest-wins certificate and expiry
//! snapshots, and the fired-alert log that backs dedup. The
//! [`ResultStore`] trait is the seam the orchestrator talks through, so
//! cycle tests can substitute a failing store.

pub mod error;
pub mod store;


use chrono::{DateTime, Utc};
use domwatch_common::types::{
    AlertCategory, AlertEvent, CertificateState, CheckResult, Domain, ExpiryState,
    RegisterDomainRequest,
};
use error::Result;

pub use store::SqliteStore;

/// Persistence boundary consumed by the orchestrator and (read-only) by
/// the query surface.
///
/// Implementations must be `Send + Sync`: the scheduler runs one cycle per
/// domain concurrently against a shared store.
pub trait ResultStore: Send + Sync {
    /// Registers a domain for monitoring. Fails when the URL has no valid
    /// hostname; the display name defaults to the hostname.
    fn register_domain(&self, req: &RegisterDomainRequest) -> Result<Domain>;

    fn get_domain(&self, id: &str) -> Result<Option<Domain>>;

    fn list_domains(&self) -> Result<Vec<Domain>>;

    /// Enabled domains whose last check is older than their interval
    /// (or that were never checked).
    fn domains_due_for_check(&self, default_interval_secs: u64) -> Result<Vec<Domain>>;

    fn update_last_checked_at(&self, domain_id: &str, ts: DateTime<Utc>) -> Result<()>;

    /// Removes a domain and all its history. Returns false when the id
    /// was unknown.
    fn delete_domain(&self, id: &str) -> Result<bool>;

    /// Appends one row of check history. Rows are never mutated.
    fn append_check_result(&self, result: &CheckResult) -> Result<()>;

    /// Latest `limit` results for a domain, newest first.
    fn latest_results(&self, domain_id: &str, limit: usize) -> Result<Vec<CheckResult>>;

    /// Latest-wins overwrite of the certificate snapshot.
    fn upsert_certificate_state(&self, state: &CertificateState) -> Result<()>;

    fn get_certificate_state(&self, domain_id: &str) -> Result<Option<CertificateState>>;

    /// Latest-wins overwrite of the registration-expiry snapshot.
    fn upsert_expiry_state(&self, state: &ExpiryState) -> Result<()>;

    fn get_expiry_state(&self, domain_id: &str) -> Result<Option<ExpiryState>>;

    /// Logs a fired alert; this is the dedup reference.
    fn record_alert(&self, event: &AlertEvent) -> Result<()>;

    /// When the last alert of this (domain, category) fired, if ever.
    fn last_alert_fired(
        &self,
        domain_id: &str,
        category: AlertCategory,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Latest `limit` alerts for a domain, newest first.
    fn recent_alerts(&self, domain_id: &str, limit: usize) -> Result<Vec<AlertEvent>>;
}
