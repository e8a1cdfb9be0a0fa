//! The three leaf checks of the monitoring engine: reachability probe,
//! TLS certificate inspection, and registration-expiry (WHOIS) lookup.
//!
//! Every check returns a structured value and never propagates a network
//! error to the caller: the prober folds failures into [`ProbeResult`],
//! the other two return a tagged [`CheckFailure`]. The orchestrator treats
//! all three as data.

pub mod certificate;
pub mod probe;
pub mod registry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a check stage failed. Variants map one-to-one onto the failure
/// causes surfaced to the UI, so each network condition stays
/// distinguishable after persistence.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum CheckFailure {
    #[error("tls error: {0}")]
    Tls(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),

    #[error("connection error: {0}")]
    Connection(String),

    /// Protocol or format error from the registry (WHOIS) side.
    #[error("registry lookup failed: {0}")]
    Registry(String),
}

/// Reachability verdict. Any answered request with status < 500 counts as
/// up; client errors still mean "the server answered".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

/// Outcome of one reachability probe. Purely functional: no retries, no
/// persistence, no panics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub status_code: Option<u16>,
    pub latency_ms: Option<f64>,
    /// URL after following redirects, when the request completed.
    pub final_url: Option<String>,
    pub error: Option<CheckFailure>,
}

impl ProbeResult {
    pub fn is_down(&self) -> bool {
        self.status == ProbeStatus::Down
    }
}

/// Parsed validity window of a served leaf certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateInfo {
    pub issuer: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Whole days until `valid_until`, truncated; negative once expired.
    pub days_remaining: i64,
}

/// Successful registry lookup. `expiration_date: None` means the registry
/// answered but exposed no expiry field, which is a valid outcome distinct
/// from a failed lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub expiration_date: Option<DateTime<Utc>>,
    pub registrar: Option<String>,
}

/// The seam between the orchestrator and the network. Production uses
/// [`NetworkChecker`]; cycle tests substitute a scripted double.
#[async_trait]
pub trait DomainChecker: Send + Sync {
    /// Probes `url` for reachability. Infallible by contract.
    async fn probe(&self, url: &str) -> ProbeResult;

    /// Opens a validating TLS connection to `hostname:443` and extracts
    /// the certificate validity window.
    async fn inspect(&self, hostname: &str) -> Result<CertificateInfo, CheckFailure>;

    /// Queries the registration expiry for `hostname` over WHOIS.
    async fn lookup(&self, hostname: &str) -> Result<RegistryInfo, CheckFailure>;
}

/// Timeouts and limits for the real network checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckLimits {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_redirects: usize,
    pub tls_timeout_secs: u64,
    pub whois_timeout_secs: u64,
}

impl Default for CheckLimits {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 3,
            read_timeout_secs: 10,
            max_redirects: 5,
            tls_timeout_secs: 5,
            whois_timeout_secs: 10,
        }
    }
}

/// Real network implementation of [`DomainChecker`].
pub struct NetworkChecker {
    client: reqwest::Client,
    limits: CheckLimits,
}

impl NetworkChecker {
    pub fn new(limits: CheckLimits) -> Result<Self, CheckFailure> {
        let client = probe::build_client(&limits)
            .map_err(|e| CheckFailure::Connection(format!("http client init: {e}")))?;
        Ok(Self { client, limits })
    }
}

#[async_trait]
impl DomainChecker for NetworkChecker {
    async fn probe(&self, url: &str) -> ProbeResult {
        probe::probe_url(&self.client, url, self.limits.max_redirects).await
    }

    async fn inspect(&self, hostname: &str) -> Result<CertificateInfo, CheckFailure> {
        certificate::inspect(hostname, 443, self.limits.tls_timeout_secs).await
    }

    async fn lookup(&self, hostname: &str) -> Result<RegistryInfo, CheckFailure> {
        registry::lookup(hostname, self.limits.whois_timeout_secs).await
    }
}
