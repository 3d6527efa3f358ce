//! Pipeline orchestrator implementation.
//!
//! One run at a time walks the state machine:
//! - Download: submit a subset job, wait, page results, fetch data files
//! - Stages: delegated steps in fixed order, each followed by an output check
//! - Notify: a final report, sent only if the network is reachable

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures::FutureExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::calendar::CalibrationCalendar;
use crate::command::RemoteRequest;
use crate::config::PathsConfig;
use crate::history::RunHistory;
use crate::metrics;
use crate::notify::NotificationService;
use crate::stages::{wait_until_ready, Stage, StageContext, StagesConfig};
use crate::staging::StagingArea;
use crate::subset::SubsetJobClient;

use super::config::OrchestratorConfig;
use super::error::OrchestratorError;
use super::report::{compose, RemediationHints};
use super::types::{DateRange, ErrorKind, PipelinePhase, PipelineRun, RunMode};

/// Failure that ends a phase, already classified.
type PhaseFailure = (ErrorKind, String);

/// Exclusive right to start one run, taken with
/// [`PipelineOrchestrator::try_begin`].
pub struct RunPermit<'a> {
    _guard: MutexGuard<'a, ()>,
}

/// Drives pipeline runs for both the daily schedule and operator requests.
pub struct PipelineOrchestrator {
    config: OrchestratorConfig,
    calendar: CalibrationCalendar,
    client: SubsetJobClient,
    staging: StagingArea,
    paths: PathsConfig,
    stages: Vec<Arc<dyn Stage>>,
    scales: Vec<u32>,
    readiness_timeout: Duration,
    readiness_poll: Duration,
    notifications: Arc<NotificationService>,
    subject_prefix: String,
    hints: RemediationHints,
    history: Option<Arc<dyn RunHistory>>,

    // Held for the whole of a run.
    run_guard: Mutex<()>,
}

impl PipelineOrchestrator {
    /// Create an orchestrator with no stages; add them with
    /// [`with_stages`](Self::with_stages).
    pub fn new(
        config: OrchestratorConfig,
        calendar: CalibrationCalendar,
        client: SubsetJobClient,
        paths: PathsConfig,
        notifications: Arc<NotificationService>,
    ) -> Self {
        let stages_defaults = StagesConfig::default();
        let hints = RemediationHints {
            help_url: client.config().help_url.clone(),
            status_url: client.config().status_url.clone(),
        };

        Self {
            config,
            calendar,
            client,
            staging: StagingArea::new(paths.raw_dir.clone()),
            paths,
            stages: Vec::new(),
            scales: stages_defaults.scales,
            readiness_timeout: Duration::from_millis(stages_defaults.readiness_timeout_ms),
            readiness_poll: Duration::from_millis(stages_defaults.readiness_poll_ms),
            notifications,
            subject_prefix: String::new(),
            hints,
            history: None,
            run_guard: Mutex::new(()),
        }
    }

    /// Stages run in [`StageKind`](crate::stages::StageKind) order whatever
    /// order they are given in.
    pub fn with_stages(mut self, mut stages: Vec<Arc<dyn Stage>>) -> Self {
        stages.sort_by_key(|s| s.kind());
        self.stages = stages;
        self
    }

    /// Scales and output readiness settings.
    pub fn with_stage_settings(mut self, config: &StagesConfig) -> Self {
        self.scales = config.scales.clone();
        self.readiness_timeout = Duration::from_millis(config.readiness_timeout_ms);
        self.readiness_poll = Duration::from_millis(config.readiness_poll_ms);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn RunHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    pub fn calendar(&self) -> &CalibrationCalendar {
        &self.calendar
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Whether a run currently holds the guard.
    pub fn is_running(&self) -> bool {
        self.run_guard.try_lock().is_err()
    }

    /// Takes the run guard, or fails if a run is in progress. The guard is
    /// released when the permit, or the run it was spent on, ends.
    pub fn try_begin(&self) -> Result<RunPermit<'_>, OrchestratorError> {
        self.run_guard
            .try_lock()
            .map(|guard| RunPermit { _guard: guard })
            .map_err(|_| OrchestratorError::RunInProgress)
    }

    /// Daily run: fetches the most recent published day and purges the
    /// staging area first on the reset day.
    pub async fn run_scheduled(&self, today: NaiveDate) -> Result<PipelineRun, OrchestratorError> {
        let _permit = self.try_begin()?;

        let should_reset = self.calendar.should_reset_today(today);
        let day = self
            .calendar
            .download_date(today, self.client.config().publication_lag_days)?;

        Ok(self
            .execute(RunMode::Scheduled, DateRange::single(day), today, should_reset)
            .await)
    }

    /// Operator-requested run over an explicit range. Never purges.
    pub async fn run_remote_triggered(
        &self,
        range: DateRange,
        today: NaiveDate,
    ) -> Result<PipelineRun, OrchestratorError> {
        let permit = self.try_begin()?;
        Ok(self.run_remote_with(permit, range, today).await)
    }

    /// Runs the range carried by a mailbox request.
    pub async fn run_request(
        &self,
        request: &RemoteRequest,
        today: NaiveDate,
    ) -> Result<PipelineRun, OrchestratorError> {
        let permit = self.try_begin()?;
        Ok(self.run_request_with(permit, request, today).await)
    }

    /// Runs a mailbox request under a permit taken before the mailbox was
    /// polled, so an accepted request cannot lose the guard to another run.
    pub async fn run_request_with(
        &self,
        permit: RunPermit<'_>,
        request: &RemoteRequest,
        today: NaiveDate,
    ) -> PipelineRun {
        self.run_remote_with(permit, request.range, today).await
    }

    async fn run_remote_with(
        &self,
        _permit: RunPermit<'_>,
        range: DateRange,
        today: NaiveDate,
    ) -> PipelineRun {
        self.execute(RunMode::RemoteTriggered, range, today, false)
            .await
    }

    async fn execute(
        &self,
        mode: RunMode,
        range: DateRange,
        today: NaiveDate,
        should_reset: bool,
    ) -> PipelineRun {
        let mut run = PipelineRun::new(mode, range, should_reset);
        run.calibration = Some(self.calendar.calibration_window(today));
        info!(
            run_id = %run.id,
            mode = %mode,
            range = %range,
            reset = should_reset,
            "Pipeline run started"
        );

        let outcome = AssertUnwindSafe(self.drive(&mut run, today))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            error!(run_id = %run.id, error = %message, "Pipeline run aborted unexpectedly");
            run.record_error(ErrorKind::UnexpectedError, message);
        }

        self.finish(&mut run, today).await;
        run
    }

    async fn drive(&self, run: &mut PipelineRun, today: NaiveDate) {
        run.phase = PipelinePhase::Downloading;
        if let Err((kind, message)) = self.download(run).await {
            warn!(run_id = %run.id, kind = %kind, error = %message, "Download phase failed");
            run.record_error(kind, message);
            if self.config.abort_on_download_error || !kind.is_download_error() {
                return;
            }
            info!(run_id = %run.id, "Continuing with the files already staged");
        }

        let ctx = StageContext {
            run_id: run.id.clone(),
            today,
            range: run.range,
            window: self.calendar.calibration_window(today),
            paths: self.paths.clone(),
            scales: self.scales.clone(),
        };

        if let Err((kind, message)) = self.run_stages(run, &ctx).await {
            run.record_error(kind, message);
        }
    }

    async fn download(&self, run: &mut PipelineRun) -> Result<(), PhaseFailure> {
        if run.reset_requested {
            let removed = self.staging.purge().await.map_err(|e| {
                (
                    ErrorKind::UnexpectedError,
                    format!("could not purge staging area: {}", e),
                )
            })?;
            info!(run_id = %run.id, removed, "Staging area purged for new calibration cycle");
        }
        self.staging.ensure().await.map_err(|e| {
            (
                ErrorKind::UnexpectedError,
                format!("could not create staging area: {}", e),
            )
        })?;

        if !self.notifications.probe().await {
            return Err((
                ErrorKind::ConnectionRetriesExhausted,
                "no network connectivity before download".to_string(),
            ));
        }

        let classify = |e: crate::subset::SubsetError| (e.kind(), e.to_string());
        let results = self
            .client
            .request_items(run.range.begin, run.range.end)
            .await
            .map_err(classify)?;

        if results.data_items.is_empty() {
            info!(
                run_id = %run.id,
                job_id = %results.job.job_id,
                kind = %ErrorKind::ZeroResultsCondition,
                "No new data for the requested dates"
            );
            run.no_data = true;
            run.note(ErrorKind::ZeroResultsCondition);
            return Ok(());
        }

        let summary = self
            .client
            .download_all(&results.data_items, self.staging.root())
            .await
            .map_err(classify)?;

        run.items_downloaded = summary.succeeded;
        run.items_failed = summary.failed.len();
        metrics::ITEMS_DOWNLOADED.inc_by(summary.succeeded as u64);
        metrics::DOWNLOADS_FAILED.inc_by(summary.failed.len() as u64);

        if let Some(first) = summary.failed.first() {
            return Err((
                ErrorKind::RemoteJobFailed,
                format!(
                    "{} of {} downloads failed; first failure {}: {}",
                    summary.failed.len(),
                    summary.attempted,
                    first.url,
                    first.cause
                ),
            ));
        }
        Ok(())
    }

    async fn run_stages(&self, run: &mut PipelineRun, ctx: &StageContext) -> Result<(), PhaseFailure> {
        let pause = Duration::from_millis(self.config.inter_stage_pause_ms);

        for stage in &self.stages {
            let kind = stage.kind();
            run.phase = kind.phase();

            if stage.requires_network() && !self.notifications.probe().await {
                return Err((
                    ErrorKind::ConnectionRetriesExhausted,
                    format!("no network connectivity before {} stage", kind),
                ));
            }

            info!(run_id = %run.id, stage = %kind, "Stage started");
            let timer = metrics::STAGE_DURATION
                .with_label_values(&[kind.as_str()])
                .start_timer();
            let result = stage.run(ctx).await;
            timer.observe_duration();

            let report = result.map_err(|e| {
                error!(run_id = %run.id, stage = %kind, error = %e, "Stage failed");
                (e.kind(), format!("{} stage failed: {}", kind, e))
            })?;

            wait_until_ready(&report.outputs, self.readiness_timeout, self.readiness_poll)
                .await
                .map_err(|e| (e.kind(), format!("{} stage: {}", kind, e)))?;

            run.stages_completed.push(kind);
            info!(
                run_id = %run.id,
                stage = %kind,
                outputs = report.outputs.len(),
                detail = report.detail.as_deref().unwrap_or(""),
                "Stage finished"
            );

            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        Ok(())
    }

    async fn finish(&self, run: &mut PipelineRun, today: NaiveDate) {
        run.phase = PipelinePhase::Notifying;
        run.latest_data_date = self.staging.latest_data_date().await;
        run.reset_date = self.calendar.reset_date(today).ok();

        let report = compose(run, &self.subject_prefix, &self.hints);
        run.notified = self.notifications.notify(&report.subject, &report.body).await;
        if !run.notified {
            if self.notifications.has_notifier() {
                run.note(ErrorKind::NotificationSendError);
                warn!(
                    run_id = %run.id,
                    kind = %ErrorKind::NotificationSendError,
                    "Run report could not be delivered"
                );
            }
            info!(
                run_id = %run.id,
                subject = %report.subject,
                body = %report.body,
                "Run report not delivered"
            );
        }

        run.phase = if run.error.is_some() {
            PipelinePhase::Failed
        } else {
            PipelinePhase::Completed
        };
        run.finished_at = Some(Utc::now());

        let outcome = run.outcome();
        metrics::RUN_OUTCOMES
            .with_label_values(&[run.mode.as_str(), outcome.as_str()])
            .inc();
        info!(
            run_id = %run.id,
            outcome = outcome.as_str(),
            items_downloaded = run.items_downloaded,
            stages = run.stages_completed.len(),
            "Pipeline run finished"
        );

        if let Some(history) = &self.history {
            if let Err(e) = history.record_run(run) {
                warn!(run_id = %run.id, error = %e, "Failed to record run history");
            } else {
                debug!(run_id = %run.id, "Run recorded");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subset::SubsetConfig;
    use crate::testing::{MockNotifier, MockProbe, MockSubsetService};
    use tempfile::TempDir;

    fn orchestrator(dir: &TempDir, service: Arc<MockSubsetService>) -> PipelineOrchestrator {
        let client = SubsetJobClient::new(
            service,
            SubsetConfig {
                poll_interval_ms: 1,
                ..Default::default()
            },
        );
        let paths = PathsConfig::under(dir.path());
        let notifications = Arc::new(NotificationService::new(
            Arc::new(MockProbe::new(true)),
            Some(Arc::new(MockNotifier::new())),
        ));
        PipelineOrchestrator::new(
            OrchestratorConfig::default(),
            CalibrationCalendar::default(),
            client,
            paths,
            notifications,
        )
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_scheduled_run_downloads_lagged_day() {
        let dir = TempDir::new().unwrap();
        let service = Arc::new(MockSubsetService::new());
        let orch = orchestrator(&dir, service.clone());

        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let run = orch.run_scheduled(today).await.unwrap();

        let expected = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        assert_eq!(run.range, DateRange::single(expected));
        assert!(!run.reset_requested);
        assert_eq!(run.phase, PipelinePhase::Completed);
        let submitted = service.submitted().await;
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].begin, expected);
        assert_eq!(submitted[0].end, expected);
    }

    #[tokio::test]
    async fn test_guard_released_after_run() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, Arc::new(MockSubsetService::new()));
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        assert!(!orch.is_running());
        orch.run_scheduled(today).await.unwrap();
        assert!(!orch.is_running());
        orch.run_scheduled(today).await.unwrap();
    }

    #[tokio::test]
    async fn test_permit_blocks_other_runs() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, Arc::new(MockSubsetService::new()));
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let permit = orch.try_begin().unwrap();
        assert!(orch.is_running());
        assert!(matches!(
            orch.run_scheduled(today).await,
            Err(OrchestratorError::RunInProgress)
        ));
        assert!(orch.try_begin().is_err());

        drop(permit);
        assert!(!orch.is_running());
        orch.run_scheduled(today).await.unwrap();
    }
}
