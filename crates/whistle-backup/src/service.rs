use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::BackupConfig;
use crate::creator::{BackupOutcome, create_backup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: BackupOutcome,
}

/// Entry point shared by the scheduler and the manual trigger.
///
/// Cheap to clone. Runs are not serialized: a manual run may overlap a
/// scheduled one and both produce their own archive.
#[derive(Clone)]
pub struct BackupService {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<BackupConfig>,
    clock: Arc<dyn Clock>,
    last_run: watch::Sender<Option<RunRecord>>,
}

impl BackupService {
    pub fn new(config: Arc<BackupConfig>) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Arc<BackupConfig>, clock: Arc<dyn Clock>) -> Self {
        let (last_run, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                last_run,
            }),
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.inner.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// Operator-initiated backup. Not gated by run mode.
    pub async fn trigger_backup(&self) -> BackupOutcome {
        info!("manual backup triggered");
        self.run_backup(Trigger::Manual).await
    }

    pub async fn run_backup(&self, trigger: Trigger) -> BackupOutcome {
        let started_at = self.inner.clock.now();
        let outcome = create_backup(&self.inner.config, self.inner.clock.as_ref()).await;
        self.inner.last_run.send_replace(Some(RunRecord {
            trigger,
            started_at,
            finished_at: self.inner.clock.now(),
            outcome: outcome.clone(),
        }));
        outcome
    }

    pub fn last_run(&self) -> Option<RunRecord> {
        self.inner.last_run.borrow().clone()
    }

    /// Notified after every finished run, manual or scheduled.
    pub fn subscribe_runs(&self) -> watch::Receiver<Option<RunRecord>> {
        self.inner.last_run.subscribe()
    }
}
