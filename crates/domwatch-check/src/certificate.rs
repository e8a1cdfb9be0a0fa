//! TLS certificate inspection.
//!
//! Unlike the reachability probe, this connection validates against the
//! webpki trust roots: a handshake failure here is a real signal. The one
//! exception is an expired (or not-yet-valid) certificate: rustls refuses
//! the handshake, but "expired" is a normal monitoring outcome, so a
//! capture-only retry recovers the validity window and the negative
//! days-remaining instead of reporting a hard failure.

use crate::{CertificateInfo, CheckFailure};
use chrono::{DateTime, Utc};
use rustls::pki_types::CertificateDer;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::*;

/// Connect to `hostname:port`, complete a TLS handshake, and parse the
/// leaf certificate's validity window.
///
/// Days-remaining is the whole-day truncation of `valid_until - now`, both
/// sides UTC; it goes negative once the certificate has expired and is
/// surfaced as-is.
pub async fn inspect(
    hostname: &str,
    port: u16,
    timeout_secs: u64,
) -> Result<CertificateInfo, CheckFailure> {
    match handshake(hostname, port, timeout_secs, true).await {
        Ok(leaf) => parse_leaf(&leaf),
        Err(CheckFailure::Tls(reason)) => {
            // Chain rejected. Capture the certificate without validation:
            // if it is merely outside its validity window, that's an
            // ordinary (negative days) result, not a failure.
            let leaf = handshake(hostname, port, timeout_secs, false).await?;
            let info = parse_leaf(&leaf)?;
            let now = Utc::now();
            if now > info.valid_until || now < info.valid_from {
                Ok(info)
            } else {
                Err(CheckFailure::Tls(reason))
            }
        }
        Err(other) => Err(other),
    }
}

async fn handshake(
    hostname: &str,
    port: u16,
    timeout_secs: u64,
    verify: bool,
) -> Result<CertificateDer<'static>, CheckFailure> {
    let config = if verify {
        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    } else {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(CaptureVerifier))
            .with_no_client_auth()
    };
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = rustls::pki_types::ServerName::try_from(hostname.to_string())
        .map_err(|e| CheckFailure::Tls(format!("invalid server name: {e}")))?;

    let addr = format!("{hostname}:{port}");
    let tcp = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        TcpStream::connect(&addr),
    )
    .await
    .map_err(|_| {
        CheckFailure::Timeout(format!("connect to {addr} timed out after {timeout_secs}s"))
    })?
    .map_err(|e| CheckFailure::Connection(format!("tcp connect to {addr} failed: {e}")))?;

    let tls_stream = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        connector.connect(server_name, tcp),
    )
    .await
    .map_err(|_| CheckFailure::Timeout(format!("tls handshake with {hostname} timed out")))?
    .map_err(|e| CheckFailure::Tls(format!("handshake with {hostname} failed: {e}")))?;

    let (_io, conn) = tls_stream.into_inner();
    let certs = conn
        .peer_certificates()
        .ok_or_else(|| CheckFailure::Tls("no peer certificates".to_string()))?;
    certs
        .first()
        .cloned()
        .map(CertificateDer::into_owned)
        .ok_or_else(|| CheckFailure::Tls("empty certificate chain".to_string()))
}

fn parse_leaf(leaf_der: &CertificateDer<'_>) -> Result<CertificateInfo, CheckFailure> {
    let (_, cert) = X509Certificate::from_der(leaf_der.as_ref())
        .map_err(|e| CheckFailure::Tls(format!("x509 parse failed: {e}")))?;

    let valid_from = to_utc(cert.validity().not_before);
    let valid_until = to_utc(cert.validity().not_after);
    let days_remaining = (valid_until - Utc::now()).num_days();

    Ok(CertificateInfo {
        issuer: Some(cert.issuer().to_string()),
        valid_from,
        valid_until,
        days_remaining,
    })
}

fn to_utc(time: ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.to_datetime().unix_timestamp(), 0).unwrap_or_default()
}

/// Accept-everything verifier used only for the capture retry after a
/// validating handshake was rejected.
#[derive(Debug)]
struct CaptureVerifier;

impl rustls::client::danger::ServerCertVerifier for CaptureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
        ]
    }
}
