//! HTTP(S) reachability probe.
//!
//! Answers "is something listening and responding", not "is the
//! certificate trustworthy" — TLS validation is deliberately disabled
//! here; trust is the certificate inspector's job.

use crate::{CheckFailure, CheckLimits, ProbeResult, ProbeStatus};
use std::error::Error as _;
use std::time::{Duration, Instant};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) domwatch/0.1";

pub(crate) fn build_client(limits: &CheckLimits) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(limits.max_redirects))
        .connect_timeout(Duration::from_secs(limits.connect_timeout_secs))
        .timeout(Duration::from_secs(limits.read_timeout_secs))
        .danger_accept_invalid_certs(true)
        .build()
}

/// Prefix a bare hostname with `http://` so `example.com` probes like a URL.
pub fn ensure_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

pub(crate) async fn probe_url(
    client: &reqwest::Client,
    url: &str,
    max_redirects: usize,
) -> ProbeResult {
    let url = ensure_scheme(url);
    let start = Instant::now();

    match client.get(&url).send().await {
        Ok(response) => {
            let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
            let code = response.status().as_u16();
            let status = if code < 500 {
                ProbeStatus::Up
            } else {
                ProbeStatus::Down
            };
            ProbeResult {
                status,
                status_code: Some(code),
                latency_ms: Some(latency_ms),
                final_url: Some(response.url().to_string()),
                error: None,
            }
        }
        Err(e) => {
            let failure = classify(&e, max_redirects);
            tracing::debug!(url = %url, error = %failure, "Probe failed");
            ProbeResult {
                status: ProbeStatus::Down,
                status_code: None,
                latency_ms: None,
                final_url: None,
                error: Some(failure),
            }
        }
    }
}

/// Map a reqwest error onto the failure taxonomy. TLS problems are buried
/// in the source chain, so the chain is scanned for handshake wording.
fn classify(err: &reqwest::Error, max_redirects: usize) -> CheckFailure {
    if err.is_timeout() {
        return CheckFailure::Timeout(err.to_string());
    }
    if err.is_redirect() {
        return CheckFailure::TooManyRedirects(max_redirects);
    }

    let mut cause: Option<&(dyn std::error::Error + 'static)> = err.source();
    while let Some(c) = cause {
        let text = c.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("handshake") || text.contains("tls") {
            return CheckFailure::Tls(c.to_string());
        }
        cause = c.source();
    }

    CheckFailure::Connection(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_added_when_missing() {
        assert_eq!(ensure_scheme("example.com"), "http://example.com");
        assert_eq!(ensure_scheme("https://example.com"), "https://example.com");
    }

    #[tokio::test]
    async fn unreachable_host_is_down_without_latency() {
        let limits = CheckLimits {
            connect_timeout_secs: 1,
            read_timeout_secs: 2,
            ..CheckLimits::default()
        };
        let client = build_client(&limits).unwrap();
        // Reserved TEST-NET-1 address, guaranteed unroutable.
        let result = probe_url(&client, "http://192.0.2.1", limits.max_redirects).await;
        assert_eq!(result.status, ProbeStatus::Down);
        assert!(result.error.is_some());
        assert!(result.latency_ms.is_none());
        assert!(result.status_code.is_none());
    }
}
