use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::schedule::CronSchedule;
use crate::service::{BackupService, Trigger};

/// A registered backup trigger. Dropping the handle leaves the trigger
/// running for the life of the process; call [`SchedulerHandle::stop`] to
/// cancel it.
pub struct SchedulerHandle {
    task: JoinHandle<()>,
    next_fire: watch::Receiver<Option<DateTime<Utc>>>,
    schedule: CronSchedule,
}

impl SchedulerHandle {
    pub fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    /// When the trigger will fire next, once the loop has computed it.
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        *self.next_fire.borrow()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

/// Register the daily backup trigger.
///
/// Only active in production or with `ENABLE_BACKUPS` set; otherwise nothing
/// is registered and `None` is returned. Each call registers an independent
/// trigger. No run history is persisted: after a restart the next fire is
/// computed from the current wall clock and missed fires are not replayed.
pub fn init_backup_scheduler(service: &BackupService) -> Option<SchedulerHandle> {
    let config = service.config();
    if !config.scheduling_enabled() {
        info!("backups disabled in development, set ENABLE_BACKUPS=true to enable");
        return None;
    }

    let schedule = config.schedule.clone();
    let (next_tx, next_rx) = watch::channel(None);
    let task = tokio::spawn(run_trigger_loop(service.clone(), schedule.clone(), next_tx));

    info!("backup scheduler initialized, backups will run on '{}' (local time)", schedule);
    Some(SchedulerHandle {
        task,
        next_fire: next_rx,
        schedule,
    })
}

/// Wait before recomputing when the schedule yields no fire time.
const RETRY_AFTER: Duration = Duration::from_secs(60 * 60);

/// Next fire strictly after both `now` and the previous fire, evaluated on
/// `zone`'s wall clock.
fn next_fire<Tz: TimeZone>(
    schedule: &CronSchedule,
    zone: &Tz,
    now: DateTime<Utc>,
    not_before: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let from = match not_before {
        Some(last) if last > now => last,
        _ => now,
    };
    schedule
        .next_after(&from.with_timezone(zone))
        .map(|next| next.with_timezone(&Utc))
}

async fn run_trigger_loop(
    service: BackupService,
    schedule: CronSchedule,
    next_tx: watch::Sender<Option<DateTime<Utc>>>,
) {
    // Never fire twice for the same slot, even if the timer wakes a little
    // before the wall clock reaches it.
    let mut not_before: Option<DateTime<Utc>> = None;

    loop {
        let now = service.clock().now();
        let Some(next) = next_fire(&schedule, &Local, now, not_before) else {
            warn!(
                "no fire time found for backup schedule '{}', retrying in {}s",
                schedule,
                RETRY_AFTER.as_secs()
            );
            next_tx.send_replace(None);
            sleep(RETRY_AFTER).await;
            continue;
        };
        next_tx.send_replace(Some(next));

        let wait = (next - now).to_std().unwrap_or_default();
        debug!("backup scheduler sleeping for {}s until {}", wait.as_secs(), next);
        sleep(wait).await;
        not_before = Some(next);

        info!("starting scheduled backup");
        // Detached: a slow run must not delay the next tick.
        let service = service.clone();
        tokio::spawn(async move {
            service.run_backup(Trigger::Scheduled).await;
        });
    }
}
