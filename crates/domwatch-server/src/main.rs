use anyhow::Result;
use domwatch_alert::{AlertPolicy, CooldownGate};
use domwatch_check::NetworkChecker;
use domwatch_notify::NotificationManager;
use domwatch_server::config::{DomainSeedFile, ServerConfig};
use domwatch_server::orchestrator::{Orchestrator, RetryPolicy};
use domwatch_server::scheduler::CheckScheduler;
use domwatch_storage::{ResultStore, SqliteStore};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  domwatch-server [config.toml]                         Start the server");
    eprintln!("  domwatch-server init-domains <config.toml> <seed.json>  Register domains from a seed file");
    eprintln!("  domwatch-server list-domains <config.toml>            Print registered domains");
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install default CryptoProvider: {e:?}"))?;

    domwatch_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("domwatch=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-domains") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-domains requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-domains requires <seed.json> argument")
            })?;
            run_init_domains(config_path, seed_path)
        }
        Some("list-domains") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("list-domains requires <config.toml> argument")
            })?;
            run_list_domains(config_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

/// Register domains from a JSON seed file. Already-registered URLs are
/// reported and skipped.
fn run_init_domains(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = SqliteStore::new(Path::new(&config.data_dir))?;

    let seed_content = std::fs::read_to_string(seed_path)
        .map_err(|e| anyhow::anyhow!("Failed to read seed file '{seed_path}': {e}"))?;
    let seed: DomainSeedFile = serde_json::from_str(&seed_content)
        .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{seed_path}': {e}"))?;

    let existing: Vec<String> = store
        .list_domains()?
        .into_iter()
        .map(|d| d.url)
        .collect();

    let mut registered = 0usize;
    for request in &seed.domains {
        if existing.iter().any(|url| url == &request.url) {
            tracing::info!(url = %request.url, "Domain already registered, skipping");
            continue;
        }
        let domain = store.register_domain(request)?;
        tracing::info!(id = %domain.id, name = %domain.name, url = %domain.url, "Domain registered");
        registered += 1;
    }

    tracing::info!(registered, total = seed.domains.len(), "Domain seeding finished");
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_list_domains(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = SqliteStore::new(Path::new(&config.data_dir))?;

    for domain in store.list_domains()? {
        println!(
            "{}  {}  {}  enabled={}  last_checked={}",
            domain.id,
            domain.name,
            domain.url,
            domain.enabled,
            domain
                .last_checked_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
    }
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    tracing::info!(config = config_path, data_dir = %config.data_dir, "Starting domwatch server");

    let store: Arc<dyn ResultStore> = Arc::new(SqliteStore::new(Path::new(&config.data_dir))?);

    let checker = Arc::new(
        NetworkChecker::new(config.check.limits())
            .map_err(|e| anyhow::anyhow!("Failed to build network checker: {e}"))?,
    );

    let channels = config.notify.build_channels()?;
    if channels.is_empty() {
        tracing::warn!("No notification channels configured; alerts will only be persisted");
    }
    let notifier = Arc::new(NotificationManager::new(channels));

    let policy = AlertPolicy {
        cert_warning_days: config.alerts.cert_warning_days,
        cert_critical_days: config.alerts.cert_expiry_days,
    };
    let gate = CooldownGate::new(config.alerts.cooldown_secs);
    let retry = RetryPolicy {
        max_attempts: config.check.retry_attempts,
        backoff_secs: config.check.retry_backoff_secs,
    };

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        checker,
        notifier,
        policy,
        gate,
        retry,
    ));

    let scheduler = CheckScheduler::new(
        store,
        orchestrator,
        config.check.interval_secs,
        config.check.tick_secs,
        config.check.max_concurrent,
    );

    // In-flight network calls are abandoned on shutdown; their timeouts
    // bound how long the sockets linger.
    tokio::select! {
        _ = scheduler.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, exiting");
        }
    }

    Ok(())
}
