//! Cron-driven triggers for the daily run and the mailbox poll.
//!
//! Each schedule is one task that sleeps until its next tick. A tick noticed
//! later than the misfire grace is skipped, and ticks that pass while a job is
//! still running are never replayed.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use droughtwatch_core::config::ScheduleConfig;
use droughtwatch_core::{CommandChannel, OrchestratorError, PipelineOrchestrator};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Parses a six-field, seconds-first cron expression.
pub fn parse_schedule(expr: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(expr)
}

/// First tick strictly after `after`.
pub fn next_fire<Tz: TimeZone>(schedule: &Schedule, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    schedule.after(after).next()
}

/// Whether a tick due at `due` and noticed at `now` is too late to run.
pub fn is_misfire<Tz: TimeZone>(due: &DateTime<Tz>, now: &DateTime<Tz>, grace: Duration) -> bool {
    now.clone()
        .signed_duration_since(due.clone())
        .to_std()
        .map(|late| late > grace)
        .unwrap_or(false)
}

/// Runs `job` on every tick of `schedule` until `shutdown` flips to true.
pub async fn run_schedule<F, Fut>(
    name: &'static str,
    schedule: Schedule,
    grace: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        if *shutdown.borrow() {
            break;
        }
        let now = Local::now();
        let Some(due) = next_fire(&schedule, &now) else {
            warn!(schedule = name, "Schedule has no upcoming ticks");
            break;
        };
        let wait = (due - now).to_std().unwrap_or(Duration::ZERO);
        debug!(schedule = name, due = %due, "Waiting for next tick");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        if is_misfire(&due, &Local::now(), grace) {
            warn!(schedule = name, due = %due, "Tick missed its grace period, skipping");
            continue;
        }
        job().await;
    }
    info!(schedule = name, "Schedule stopped");
}

/// Daily scheduled run.
pub async fn scheduled_run(orchestrator: &PipelineOrchestrator) {
    match orchestrator.run_scheduled(Local::now().date_naive()).await {
        Ok(run) => info!(run_id = %run.id, outcome = run.outcome().as_str(), "Scheduled run done"),
        Err(OrchestratorError::RunInProgress) => {
            warn!("Scheduled run skipped: another run is in progress")
        }
        Err(e) => error!(error = %e, "Scheduled run could not start"),
    }
}

/// One mailbox poll, running the request it yields.
///
/// The run guard is taken before polling: an accepted request is flagged and
/// recorded as processed, so it must not race another run for the guard.
pub async fn mailbox_poll(orchestrator: &PipelineOrchestrator, channel: &CommandChannel) {
    let permit = match orchestrator.try_begin() {
        Ok(permit) => permit,
        Err(_) => {
            debug!("Mailbox poll skipped: a run is in progress");
            return;
        }
    };

    let request = match channel.poll().await {
        Ok(Some(request)) => request,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "Mailbox poll failed");
            return;
        }
    };

    info!(
        message_id = %request.message_id,
        range = %request.range,
        "Running remote request"
    );
    let run = orchestrator
        .run_request_with(permit, &request, Local::now().date_naive())
        .await;
    info!(run_id = %run.id, outcome = run.outcome().as_str(), "Remote run done");
}

/// Spawns the enabled schedules.
pub fn spawn_schedules(
    config: &ScheduleConfig,
    orchestrator: Arc<PipelineOrchestrator>,
    channel: Option<Arc<CommandChannel>>,
    shutdown: watch::Receiver<bool>,
) -> Result<Vec<JoinHandle<()>>, cron::error::Error> {
    let grace = Duration::from_secs(config.misfire_grace_secs);
    let mut handles = Vec::new();

    if config.daily_enabled {
        let schedule = parse_schedule(&config.daily_cron)?;
        let orchestrator = Arc::clone(&orchestrator);
        info!(cron = %config.daily_cron, "Daily run scheduled");
        handles.push(tokio::spawn(run_schedule(
            "daily",
            schedule,
            grace,
            shutdown.clone(),
            move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move { scheduled_run(&orchestrator).await }
            },
        )));
    }

    match (config.mailbox_enabled, channel) {
        (true, Some(channel)) => {
            let schedule = parse_schedule(&config.mailbox_cron)?;
            info!(cron = %config.mailbox_cron, "Mailbox poll scheduled");
            handles.push(tokio::spawn(run_schedule(
                "mailbox",
                schedule,
                grace,
                shutdown,
                move || {
                    let orchestrator = Arc::clone(&orchestrator);
                    let channel = Arc::clone(&channel);
                    async move { mailbox_poll(&orchestrator, &channel).await }
                },
            )));
        }
        (true, None) => info!("Mailbox poll enabled but no mailbox configured"),
        (false, _) => info!("Mailbox poll disabled"),
    }

    Ok(handles)
}
