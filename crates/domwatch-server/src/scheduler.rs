//! Periodic trigger: finds due domains and runs one cycle per domain,
//! bounded by a semaphore so outbound network capacity is not swamped.

use crate::orchestrator::{CycleError, Orchestrator};
use domwatch_storage::ResultStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration};

pub struct CheckScheduler {
    store: Arc<dyn ResultStore>,
    orchestrator: Arc<Orchestrator>,
    default_interval_secs: u64,
    tick_secs: u64,
    max_concurrent: usize,
}

impl CheckScheduler {
    pub fn new(
        store: Arc<dyn ResultStore>,
        orchestrator: Arc<Orchestrator>,
        default_interval_secs: u64,
        tick_secs: u64,
        max_concurrent: usize,
    ) -> Self {
        Self {
            store,
            orchestrator,
            default_interval_secs,
            tick_secs,
            max_concurrent,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            tick_secs = self.tick_secs,
            default_interval = self.default_interval_secs,
            max_concurrent = self.max_concurrent,
            "Check scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.tick_secs));
        loop {
            tick.tick().await;
            if let Err(e) = self.run_due_cycles().await {
                tracing::error!(error = %e, "Scheduler tick failed");
            }
        }
    }

    async fn run_due_cycles(&self) -> anyhow::Result<()> {
        let domains = self
            .store
            .domains_due_for_check(self.default_interval_secs)?;

        if domains.is_empty() {
            return Ok(());
        }

        tracing::info!(count = domains.len(), "Running check cycles for due domains");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::new();

        for domain in domains {
            let permit = semaphore.clone().acquire_owned().await?;
            let orchestrator = self.orchestrator.clone();

            let handle = tokio::spawn(async move {
                match orchestrator.run_cycle(&domain).await {
                    Ok(report) => {
                        tracing::info!(
                            domain = %domain.name,
                            reachability = ?report.reachability.status,
                            alerts = report.alerts_fired.len(),
                            results = report.results_appended,
                            "Cycle completed"
                        );
                    }
                    Err(CycleError::AlreadyRunning(_)) => {
                        tracing::debug!(
                            domain = %domain.name,
                            "Previous cycle still in flight, skipping tick"
                        );
                    }
                    // Fatal for this domain's cycle only; the tick goes on.
                    Err(e) => {
                        tracing::error!(domain = %domain.name, error = %e, "Cycle failed");
                    }
                }
                drop(permit);
            });

            handles.push(handle);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Check cycle task panicked");
            }
        }

        Ok(())
    }
}
