//! Registration-expiry lookup over WHOIS (TCP port 43).
//!
//! Registries disagree on response format and availability, so this is the
//! least reliable of the three checks. The query goes to `whois.iana.org`
//! first, then follows the `refer:` line to the TLD registry. A response
//! with no recognizable expiry field is a valid outcome ([`RegistryInfo`]
//! with `expiration_date: None`), distinct from a failed lookup.

use crate::{CheckFailure, RegistryInfo};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const IANA_WHOIS: &str = "whois.iana.org";
const WHOIS_PORT: u16 = 43;

/// Keys registries use for the expiration field, checked in order.
/// The first line that both matches a key and carries a parseable date
/// is authoritative (multi-record responses are common).
const EXPIRY_KEYS: &[&str] = &[
    "registry expiry date",
    "registrar registration expiration date",
    "expiry date",
    "expiration date",
    "expiration time",
    "paid-till",
    "expires",
];

pub async fn lookup(hostname: &str, timeout_secs: u64) -> Result<RegistryInfo, CheckFailure> {
    let domain = registrable_name(hostname);

    let iana_response = query(IANA_WHOIS, &domain, timeout_secs).await?;
    let response = match referral_server(&iana_response) {
        Some(server) => query(&server, &domain, timeout_secs).await?,
        // A few TLDs answer directly from IANA.
        None => iana_response,
    };

    Ok(parse_response(&response))
}

/// Strip a `www.` prefix; WHOIS servers answer for the registered name.
fn registrable_name(hostname: &str) -> String {
    hostname
        .strip_prefix("www.")
        .unwrap_or(hostname)
        .to_ascii_lowercase()
}

async fn query(server: &str, domain: &str, timeout_secs: u64) -> Result<String, CheckFailure> {
    let addr = format!("{server}:{WHOIS_PORT}");
    let timeout = Duration::from_secs(timeout_secs);

    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| CheckFailure::Timeout(format!("whois connect to {addr} timed out")))?
        .map_err(|e| CheckFailure::Connection(format!("whois connect to {addr} failed: {e}")))?;

    stream
        .write_all(format!("{domain}\r\n").as_bytes())
        .await
        .map_err(|e| CheckFailure::Registry(format!("whois query to {server} failed: {e}")))?;

    let mut buf = Vec::new();
    tokio::time::timeout(timeout, stream.read_to_end(&mut buf))
        .await
        .map_err(|_| CheckFailure::Timeout(format!("whois read from {server} timed out")))?
        .map_err(|e| CheckFailure::Registry(format!("whois read from {server} failed: {e}")))?;

    if buf.is_empty() {
        return Err(CheckFailure::Registry(format!("empty response from {server}")));
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Extract the `refer:` server from an IANA response.
fn referral_server(response: &str) -> Option<String> {
    for line in response.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("refer:") {
            let server = value.trim();
            if !server.is_empty() {
                return Some(server.to_string());
            }
        }
    }
    None
}

/// Scan a registry response for the expiration date and registrar name.
fn parse_response(response: &str) -> RegistryInfo {
    let mut expiration_date = None;
    let mut registrar = None;

    for line in response.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        if expiration_date.is_none() && EXPIRY_KEYS.contains(&key.as_str()) {
            expiration_date = parse_date(value);
        }
        if registrar.is_none() && key == "registrar" {
            registrar = Some(value.to_string());
        }
    }

    RegistryInfo {
        expiration_date,
        registrar,
    }
}

/// Try the date formats seen across registries.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y.%m.%d %H:%M:%S",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%d-%b-%Y", "%d.%m.%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn strips_www_prefix() {
        assert_eq!(registrable_name("www.google.com"), "google.com");
        assert_eq!(registrable_name("Example.COM"), "example.com");
    }

    #[test]
    fn extracts_referral() {
        let response = "% IANA WHOIS server\nrefer:        whois.verisign-grs.com\n\ndomain: COM\n";
        assert_eq!(
            referral_server(response),
            Some("whois.verisign-grs.com".to_string())
        );
        assert_eq!(referral_server("domain: XYZ\n"), None);
    }

    #[test]
    fn parses_verisign_style_expiry() {
        let response = "Domain Name: GOOGLE.COM\n\
                        Registrar: MarkMonitor Inc.\n\
                        Registry Expiry Date: 2028-09-14T04:00:00Z\n";
        let info = parse_response(response);
        let expiry = info.expiration_date.unwrap();
        assert_eq!(expiry.year(), 2028);
        assert_eq!(expiry.month(), 9);
        assert_eq!(info.registrar.as_deref(), Some("MarkMonitor Inc."));
    }

    #[test]
    fn first_date_wins_in_multi_record_response() {
        let response = "Expiration Date: 2027-01-02\nExpiration Date: 2030-05-06\n";
        let info = parse_response(response);
        assert_eq!(info.expiration_date.unwrap().year(), 2027);
    }

    #[test]
    fn paid_till_format() {
        let response = "paid-till: 2026.03.04\n";
        let info = parse_response(response);
        let expiry = info.expiration_date.unwrap();
        assert_eq!((expiry.year(), expiry.month(), expiry.day()), (2026, 3, 4));
    }

    #[test]
    fn missing_expiry_field_is_not_an_error() {
        let info = parse_response("Domain Name: EXAMPLE.ORG\nStatus: active\n");
        assert!(info.expiration_date.is_none());
    }
}
