use anyhow::Result;
use domwatch_check::CheckLimits;
use domwatch_common::types::RegisterDomainRequest;
use domwatch_notify::channels::{EmailChannel, WebhookChannel};
use domwatch_notify::NotificationChannel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub check: CheckConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Default seconds between cycles for a domain (overridable per domain).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How often the scheduler looks for due domains.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Upper bound on concurrently running domain cycles.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_tls_timeout_secs")]
    pub tls_timeout_secs: u64,
    #[serde(default = "default_whois_timeout_secs")]
    pub whois_timeout_secs: u64,
    /// Attempts for the reachability probe before the cycle accepts DOWN.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
}

impl CheckConfig {
    pub fn limits(&self) -> CheckLimits {
        CheckLimits {
            connect_timeout_secs: self.connect_timeout_secs,
            read_timeout_secs: self.read_timeout_secs,
            max_redirects: self.max_redirects,
            tls_timeout_secs: self.tls_timeout_secs,
            whois_timeout_secs: self.whois_timeout_secs,
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            tick_secs: default_tick_secs(),
            max_concurrent: default_max_concurrent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            max_redirects: default_max_redirects(),
            tls_timeout_secs: default_tls_timeout_secs(),
            whois_timeout_secs: default_whois_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Warning-level certificate alert below this many days remaining.
    #[serde(default = "default_cert_warning_days")]
    pub cert_warning_days: i64,
    /// Critical-level certificate alert below this many days remaining.
    #[serde(default = "default_cert_expiry_days")]
    pub cert_expiry_days: i64,
    /// Repeat-alert suppression window per (domain, category).
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cert_warning_days: default_cert_warning_days(),
            cert_expiry_days: default_cert_expiry_days(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub email: Option<EmailConfig>,
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    pub from: String,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub body_template: Option<String>,
}

impl NotifyConfig {
    /// Instantiate the configured transports.
    pub fn build_channels(&self) -> Result<Vec<Box<dyn NotificationChannel>>> {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if let Some(email) = &self.email {
            channels.push(Box::new(EmailChannel::new(
                &email.smtp_host,
                email.smtp_port,
                email.smtp_username.as_deref(),
                email.smtp_password.as_deref(),
                &email.from,
                email.recipients.clone(),
            )?));
        }

        for webhook in &self.webhooks {
            channels.push(Box::new(WebhookChannel::new(
                &webhook.url,
                webhook.body_template.clone(),
            )?));
        }

        Ok(channels)
    }
}

/// Seed file consumed by the `init-domains` subcommand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSeedFile {
    #[serde(default)]
    pub domains: Vec<RegisterDomainRequest>,
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_interval_secs() -> u64 {
    300
}
fn default_tick_secs() -> u64 {
    30
}
fn default_max_concurrent() -> usize {
    8
}
fn default_connect_timeout_secs() -> u64 {
    3
}
fn default_read_timeout_secs() -> u64 {
    10
}
fn default_max_redirects() -> usize {
    5
}
fn default_tls_timeout_secs() -> u64 {
    5
}
fn default_whois_timeout_secs() -> u64 {
    10
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff_secs() -> u64 {
    60
}
fn default_cert_warning_days() -> i64 {
    30
}
fn default_cert_expiry_days() -> i64 {
    7
}
fn default_cooldown_secs() -> u64 {
    86400
}
fn default_smtp_port() -> u16 {
    465
}
