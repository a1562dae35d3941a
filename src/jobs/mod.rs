//! Background job scheduling

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::Config;
use crate::pipeline::{TriggerDispatcher, TriggerError};

/// Delay before the startup run, so the listener is up first
const STARTUP_RUN_DELAY: Duration = Duration::from_secs(3);

async fn scheduled_run(dispatcher: Arc<TriggerDispatcher>, reason: &'static str) {
    info!(reason, "Running scheduled pipeline");
    match dispatcher.run().await {
        Ok(summary) => info!(
            reason,
            total = summary.total,
            failed = summary.failed,
            "Scheduled run finished"
        ),
        Err(TriggerError::AlreadyRunning) => info!(reason, "Previous run still active, skipping tick"),
        Err(e) => error!(reason, error = %e, "Scheduled run failed"),
    }
}

/// Initialize and start the job scheduler
pub async fn start_scheduler(
    config: &Config,
    dispatcher: Arc<TriggerDispatcher>,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    if let Some(schedule) = &config.schedule {
        let cron_dispatcher = dispatcher.clone();
        let job = Job::new_async(schedule.as_str(), move |_uuid, _l| {
            let dispatcher = cron_dispatcher.clone();
            Box::pin(async move {
                scheduled_run(dispatcher, "cron").await;
            })
        })?;
        scheduler.add(job).await?;
        info!(schedule = %schedule, "Periodic run scheduled");
    }

    if config.run_once_immediately {
        let once_dispatcher = dispatcher.clone();
        let job = Job::new_one_shot_async(STARTUP_RUN_DELAY, move |_uuid, _l| {
            let dispatcher = once_dispatcher.clone();
            Box::pin(async move {
                scheduled_run(dispatcher, "startup").await;
            })
        })?;
        scheduler.add(job).await?;
        info!("Startup run scheduled");
    }

    scheduler.start().await?;

    info!("Job scheduler started");
    Ok(scheduler)
}
