// Job Record Retention
//
// Dismissed records are hidden, not forgotten; this sweeper is the only
// place a record is actually removed. Terminal jobs left undismissed are
// also garbage-collected after a longer audit window.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::application::pool::constants::{
    DEFAULT_DISMISSED_RETENTION, DEFAULT_SWEEP_INTERVAL, DEFAULT_TERMINAL_RETENTION,
};
use crate::application::pool::ShutdownToken;
use crate::application::store::{JobFilter, JobStore};
use crate::domain::JobStatus;
use crate::port::TimeProvider;

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// How long a DISMISSED record is kept before removal
    pub dismissed_max_age: Duration,
    /// How long an undismissed terminal record is kept
    pub terminal_max_age: Duration,
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            dismissed_max_age: DEFAULT_DISMISSED_RETENTION,
            terminal_max_age: DEFAULT_TERMINAL_RETENTION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

pub struct RetentionSweeper {
    store: Arc<JobStore>,
    time_provider: Arc<dyn TimeProvider>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<JobStore>,
        time_provider: Arc<dyn TimeProvider>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            store,
            time_provider,
            config,
        }
    }

    /// Periodic sweep loop, runs until shutdown
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            "Retention sweeper started"
        );
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        // The immediate first tick would sweep at startup; skip it
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.wait() => {
                    info!("Retention sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        info!(removed, "Retention sweep removed expired job records");
                    }
                }
            }
        }
    }

    /// Remove expired records, returning how many were removed
    ///
    /// Age is measured from `updated_at`: the moment the record reached its
    /// resting state, not when the job was created.
    pub fn sweep(&self) -> usize {
        let now = self.time_provider.now_millis();
        let dismissed_cutoff = now - self.config.dismissed_max_age.as_millis() as i64;
        let terminal_cutoff = now - self.config.terminal_max_age.as_millis() as i64;

        let all = self.store.list(&JobFilter {
            include_dismissed: true,
            ..Default::default()
        });

        let mut removed = 0;
        for job in all {
            let expired = match job.status {
                JobStatus::Dismissed => job.updated_at < dismissed_cutoff,
                status if status.is_terminal() => job.updated_at < terminal_cutoff,
                _ => false,
            };
            if expired && self.store.remove(&job.id).is_ok() {
                debug!(job_id = %job.id, status = %job.status, "Expired job record removed");
                removed += 1;
            }
        }
        removed
    }
}
