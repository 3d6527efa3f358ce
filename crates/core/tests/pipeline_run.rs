//! Pipeline run integration tests.
//!
//! These tests drive whole runs through the orchestrator with mock
//! collaborators: download -> stages -> notification -> history.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tempfile::TempDir;

use droughtwatch_core::{
    command::{CommandChannel, MailboxConfig},
    notify::NotifyError,
    subset::{DownloadError, JobStatus, SubsetConfig},
    testing::{
        fixtures, MockMailbox, MockNotifier, MockProbe, MockStage, MockSubsetService, StageLog,
    },
    CalibrationCalendar, ConnectivityProbe, DateRange, ErrorKind, Notifier, NotificationService,
    OrchestratorConfig, OrchestratorError, PathsConfig, PipelineOrchestrator, PipelinePhase,
    ProcessedMessages, RunHistory, RunMode, RunOutcome, SqliteHistoryStore, Stage, StageKind,
    SubsetJobClient, SubsetService,
};
use droughtwatch_core::stages::{StageContext, StageError, StageReport, StagesConfig};

const PREFIX: &str = "[EHCPA]";

/// Test helper holding every collaborator of an orchestrator.
struct TestHarness {
    paths: PathsConfig,
    service: Arc<MockSubsetService>,
    probe: Arc<MockProbe>,
    notifier: Arc<MockNotifier>,
    history: Arc<SqliteHistoryStore>,
    log: StageLog,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let history = SqliteHistoryStore::new(&temp_dir.path().join("history.db"))
            .expect("Failed to create history store");

        Self {
            paths: PathsConfig::under(temp_dir.path()),
            service: Arc::new(MockSubsetService::new()),
            probe: Arc::new(MockProbe::new(true)),
            notifier: Arc::new(MockNotifier::new()),
            history: Arc::new(history),
            log: StageLog::default(),
            _temp_dir: temp_dir,
        }
    }

    fn subset_config(&self) -> SubsetConfig {
        SubsetConfig {
            poll_interval_ms: 1,
            max_wait_secs: 5,
            help_url: "https://help.example.org/data-access".to_string(),
            status_url: "https://status.example.org".to_string(),
            ..Default::default()
        }
    }

    fn orchestrator(
        &self,
        config: OrchestratorConfig,
        stages: Vec<Arc<dyn Stage>>,
    ) -> PipelineOrchestrator {
        let client = SubsetJobClient::new(
            Arc::clone(&self.service) as Arc<dyn SubsetService>,
            self.subset_config(),
        );
        let notifications = Arc::new(NotificationService::new(
            Arc::clone(&self.probe) as Arc<dyn ConnectivityProbe>,
            Some(Arc::clone(&self.notifier) as Arc<dyn Notifier>),
        ));
        let stage_settings = StagesConfig {
            scales: vec![1, 3],
            readiness_timeout_ms: 1000,
            readiness_poll_ms: 5,
            ..Default::default()
        };

        PipelineOrchestrator::new(
            config,
            CalibrationCalendar::default(),
            client,
            self.paths.clone(),
            notifications,
        )
        .with_stages(stages)
        .with_stage_settings(&stage_settings)
        .with_history(Arc::clone(&self.history) as Arc<dyn RunHistory>)
        .with_subject_prefix(PREFIX)
    }

    /// A stage that writes one file under the output directory.
    fn stage(&self, kind: StageKind) -> Arc<MockStage> {
        let output = self.paths.output_dir.join(format!("{}.out", kind));
        Arc::new(
            MockStage::new(kind)
                .with_outputs(vec![output])
                .with_log(Arc::clone(&self.log)),
        )
    }

    fn standard_stages(&self) -> Vec<Arc<dyn Stage>> {
        [
            StageKind::Aggregate,
            StageKind::Concatenate,
            StageKind::DroughtIndex,
            StageKind::Publish,
        ]
        .into_iter()
        .map(|kind| self.stage(kind) as Arc<dyn Stage>)
        .collect()
    }

    async fn executed(&self) -> Vec<StageKind> {
        self.log.read().await.clone()
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_scheduled_run_completes_and_reports() {
    let harness = TestHarness::new();
    harness.service.set_items(fixtures::data_items(3)).await;
    let orch = harness.orchestrator(OrchestratorConfig::default(), harness.standard_stages());

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert_eq!(run.mode, RunMode::Scheduled);
    assert_eq!(run.range, DateRange::single(date(2024, 3, 8)));
    assert_eq!(run.phase, PipelinePhase::Completed);
    assert!(run.error.is_none());
    assert_eq!(run.items_downloaded, 3);
    assert_eq!(
        run.stages_completed,
        vec![
            StageKind::Aggregate,
            StageKind::Concatenate,
            StageKind::DroughtIndex,
            StageKind::Publish
        ]
    );
    assert_eq!(run.latest_data_date, Some(fixtures::data_item_date(2)));
    assert_eq!(run.reset_date, Some(date(2024, 4, 3)));
    assert!(run.notified);

    let sent = harness.notifier.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "[EHCPA] Pipeline completed");
    assert!(sent[0].body.contains("Latest data available: 2024-01-03"));
    assert!(sent[0].body.contains("Next calibration reset: 2024-04-03"));

    let recorded = harness.history.recent_runs(10).unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].id, run.id);
}

#[tokio::test]
async fn test_stages_run_in_fixed_order_whatever_the_registration_order() {
    let harness = TestHarness::new();
    harness.service.set_items(fixtures::data_items(1)).await;
    let mut stages = harness.standard_stages();
    stages.reverse();
    let orch = harness.orchestrator(OrchestratorConfig::default(), stages);

    orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert_eq!(
        harness.executed().await,
        vec![
            StageKind::Aggregate,
            StageKind::Concatenate,
            StageKind::DroughtIndex,
            StageKind::Publish
        ]
    );
}

#[tokio::test]
async fn test_partial_download_failure_raises_remote_job_alert() {
    let harness = TestHarness::new();
    let items = fixtures::data_items(10);
    for item in &items[..8] {
        harness
            .service
            .fail_download(&item.link, DownloadError::Status(503))
            .await;
    }
    harness.service.set_items(items).await;
    let orch = harness.orchestrator(OrchestratorConfig::default(), harness.standard_stages());

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert_eq!(run.phase, PipelinePhase::Failed);
    let error = run.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::RemoteJobFailed);
    assert!(error.message.contains("8 of 10"));
    assert_eq!(run.items_downloaded, 2);
    assert_eq!(run.items_failed, 8);
    assert!(run.stages_completed.is_empty());
    assert!(harness.executed().await.is_empty());

    let sent = harness.notifier.sent().await;
    assert_eq!(sent[0].subject, "[EHCPA] Pipeline failed: RemoteJobFailed");
    assert!(sent[0].body.contains("See https://help.example.org/data-access"));
}

#[tokio::test]
async fn test_download_error_can_continue_when_policy_allows() {
    let harness = TestHarness::new();
    let items = fixtures::data_items(4);
    harness
        .service
        .fail_download(&items[0].link, DownloadError::Status(500))
        .await;
    harness.service.set_items(items).await;
    let config = OrchestratorConfig {
        abort_on_download_error: false,
        ..Default::default()
    };
    let orch = harness.orchestrator(config, harness.standard_stages());

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert_eq!(run.stages_completed.len(), 4);
    assert_eq!(run.error.as_ref().unwrap().kind, ErrorKind::RemoteJobFailed);
    assert_eq!(run.phase, PipelinePhase::Failed);
}

#[tokio::test]
async fn test_undeliverable_report_is_noted_not_failed() {
    let harness = TestHarness::new();
    harness.service.set_items(fixtures::data_items(1)).await;
    harness
        .notifier
        .set_next_error(NotifyError::Transport("relay refused".into()))
        .await;
    let orch = harness.orchestrator(OrchestratorConfig::default(), harness.standard_stages());

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert!(!run.notified);
    assert!(run.error.is_none());
    assert_eq!(run.conditions, vec![ErrorKind::NotificationSendError]);
    assert_eq!(run.outcome(), RunOutcome::Completed);
}

#[tokio::test]
async fn test_zero_results_continue_downstream() {
    let harness = TestHarness::new();
    harness
        .service
        .set_items(vec![fixtures::documentation_item("README.pdf")])
        .await;
    let orch = harness.orchestrator(OrchestratorConfig::default(), harness.standard_stages());

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert!(run.no_data);
    assert!(run.error.is_none());
    assert_eq!(run.conditions, vec![ErrorKind::ZeroResultsCondition]);
    assert_eq!(run.phase, PipelinePhase::Completed);
    assert_eq!(run.stages_completed.len(), 4);
    assert_eq!(run.latest_data_date, None);

    let sent = harness.notifier.sent().await;
    assert_eq!(sent[0].subject, "[EHCPA] Pipeline completed with no new data");
    assert!(sent[0].body.contains("Latest data available: not available"));
}

#[tokio::test]
async fn test_reset_day_purges_staging_before_download() {
    let harness = TestHarness::new();
    std::fs::create_dir_all(&harness.paths.raw_dir).unwrap();
    let stale = harness.paths.raw_dir.join("3B-DAY.20231231.nc4");
    std::fs::write(&stale, b"old").unwrap();
    harness.service.set_items(fixtures::data_items(1)).await;
    let orch = harness.orchestrator(OrchestratorConfig::default(), vec![]);

    let run = orch.run_scheduled(date(2024, 3, 3)).await.unwrap();

    assert!(run.reset_requested);
    assert_eq!(run.range, DateRange::single(date(2024, 3, 1)));
    assert!(!stale.exists());
    assert_eq!(run.reset_date, Some(date(2024, 4, 3)));
    assert!(harness.notifier.sent().await[0]
        .body
        .contains("Staging area was reset"));
}

#[tokio::test]
async fn test_other_days_keep_staging() {
    let harness = TestHarness::new();
    std::fs::create_dir_all(&harness.paths.raw_dir).unwrap();
    let kept = harness.paths.raw_dir.join("3B-DAY.20231231.nc4");
    std::fs::write(&kept, b"old").unwrap();
    let orch = harness.orchestrator(OrchestratorConfig::default(), vec![]);

    let run = orch.run_scheduled(date(2024, 3, 4)).await.unwrap();

    assert!(!run.reset_requested);
    assert!(kept.exists());
    assert_eq!(run.latest_data_date, Some(date(2023, 12, 31)));
}

#[tokio::test]
async fn test_remote_run_never_purges_and_is_tagged() {
    let harness = TestHarness::new();
    std::fs::create_dir_all(&harness.paths.raw_dir).unwrap();
    let kept = harness.paths.raw_dir.join("3B-DAY.20231231.nc4");
    std::fs::write(&kept, b"old").unwrap();
    harness.service.set_items(fixtures::data_items(2)).await;
    let orch = harness.orchestrator(OrchestratorConfig::default(), vec![]);

    let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 2)).unwrap();
    let run = orch
        .run_remote_triggered(range, date(2024, 3, 3))
        .await
        .unwrap();

    assert_eq!(run.mode, RunMode::RemoteTriggered);
    assert!(!run.reset_requested);
    assert!(kept.exists());

    let submitted = harness.service.submitted().await;
    assert_eq!(submitted[0].begin, date(2024, 1, 1));
    assert_eq!(submitted[0].end, date(2024, 1, 2));

    let sent = harness.notifier.sent().await;
    assert_eq!(
        sent[0].subject,
        "[EHCPA] [remote request 2024-01-01 to 2024-01-02] Pipeline completed"
    );
}

#[tokio::test]
async fn test_stage_failure_stops_later_stages() {
    let harness = TestHarness::new();
    harness.service.set_items(fixtures::data_items(1)).await;
    let concatenate = harness.stage(StageKind::Concatenate);
    concatenate.set_failure(Some("ncrcat: no input files")).await;
    let stages: Vec<Arc<dyn Stage>> = vec![
        harness.stage(StageKind::Aggregate),
        concatenate,
        harness.stage(StageKind::DroughtIndex),
    ];
    let orch = harness.orchestrator(OrchestratorConfig::default(), stages);

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert_eq!(run.stages_completed, vec![StageKind::Aggregate]);
    let error = run.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::StageFailed);
    assert!(error.message.contains("concatenate"));
    assert_eq!(
        harness.executed().await,
        vec![StageKind::Aggregate, StageKind::Concatenate]
    );
    // Failure reports still carry the latest data date.
    assert_eq!(run.latest_data_date, Some(fixtures::data_item_date(0)));
}

#[tokio::test]
async fn test_missing_stage_output_fails_the_run() {
    let harness = TestHarness::new();
    harness.service.set_items(fixtures::data_items(1)).await;

    /// Claims an output it never writes.
    struct Liar;

    #[async_trait]
    impl Stage for Liar {
        fn kind(&self) -> StageKind {
            StageKind::Aggregate
        }

        async fn run(&self, _ctx: &StageContext) -> Result<StageReport, StageError> {
            Ok(StageReport {
                outputs: vec![PathBuf::from("/nonexistent/monthly.nc")],
                detail: None,
            })
        }
    }

    let orch = harness.orchestrator(OrchestratorConfig::default(), vec![Arc::new(Liar)]);
    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert_eq!(run.error.as_ref().unwrap().kind, ErrorKind::StageFailed);
    assert!(run.stages_completed.is_empty());
}

#[tokio::test]
async fn test_unexpected_panic_is_reported() {
    let harness = TestHarness::new();
    harness.service.set_items(fixtures::data_items(1)).await;
    let stages: Vec<Arc<dyn Stage>> = vec![Arc::new(
        MockStage::new(StageKind::Aggregate).panicking("index out of bounds"),
    )];
    let orch = harness.orchestrator(OrchestratorConfig::default(), stages);

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    let error = run.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::UnexpectedError);
    assert!(error.message.contains("index out of bounds"));
    assert_eq!(run.phase, PipelinePhase::Failed);
    assert_eq!(harness.notifier.sent().await.len(), 1);
    assert!(!orch.is_running());
}

#[tokio::test]
async fn test_no_connectivity_stops_before_download() {
    let harness = TestHarness::new();
    harness.probe.set_reachable(false).await;
    let orch = harness.orchestrator(OrchestratorConfig::default(), harness.standard_stages());

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert_eq!(
        run.error.as_ref().unwrap().kind,
        ErrorKind::ConnectionRetriesExhausted
    );
    assert!(harness.service.submitted().await.is_empty());
    assert!(!run.notified);
    assert!(harness.notifier.sent().await.is_empty());
    // The run is still recorded locally.
    assert_eq!(harness.history.recent_runs(5).unwrap().len(), 1);
}

/// Aggregation stage that takes the network down while it runs.
struct CutsNetwork(Arc<MockProbe>);

#[async_trait]
impl Stage for CutsNetwork {
    fn kind(&self) -> StageKind {
        StageKind::Aggregate
    }

    async fn run(&self, _ctx: &StageContext) -> Result<StageReport, StageError> {
        self.0.set_reachable(false).await;
        Ok(StageReport::default())
    }
}

#[tokio::test]
async fn test_network_stage_gated_on_connectivity() {
    let harness = TestHarness::new();
    harness.service.set_items(fixtures::data_items(1)).await;
    let publish = Arc::new(MockStage::new(StageKind::Publish).with_network());
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(CutsNetwork(Arc::clone(&harness.probe))),
        publish.clone(),
    ];
    let orch = harness.orchestrator(OrchestratorConfig::default(), stages);

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    assert_eq!(run.stages_completed, vec![StageKind::Aggregate]);
    assert_eq!(publish.runs().await, 0);
    assert_eq!(
        run.error.as_ref().unwrap().kind,
        ErrorKind::ConnectionRetriesExhausted
    );
    assert!(!run.notified);
}

#[tokio::test]
async fn test_remote_job_failure_is_reported() {
    let harness = TestHarness::new();
    let mut failed = fixtures::status_report("mock-job", JobStatus::Failed);
    failed.message = Some("subsetting service unavailable".to_string());
    harness.service.push_statuses(vec![failed]).await;
    let orch = harness.orchestrator(OrchestratorConfig::default(), harness.standard_stages());

    let run = orch.run_scheduled(date(2024, 3, 10)).await.unwrap();

    let error = run.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::RemoteJobFailed);
    assert!(error.message.contains("subsetting service unavailable"));
    assert!(harness.executed().await.is_empty());
}

#[tokio::test]
async fn test_overlapping_runs_are_rejected() {
    let harness = TestHarness::new();
    // Keep the first run polling.
    harness.service.set_default_status(JobStatus::Running).await;
    let orch = Arc::new(harness.orchestrator(OrchestratorConfig::default(), vec![]));

    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.run_scheduled(date(2024, 3, 10)).await })
    };

    let mut waited = 0;
    while !orch.is_running() && waited < 100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += 1;
    }
    assert!(orch.is_running());

    let range = DateRange::single(date(2024, 3, 1));
    let second = orch.run_remote_triggered(range, date(2024, 3, 10)).await;
    assert!(matches!(second, Err(OrchestratorError::RunInProgress)));

    // Let the first run finish.
    harness.service.set_default_status(JobStatus::Succeeded).await;
    let run = first.await.unwrap().unwrap();
    assert_eq!(run.phase, PipelinePhase::Completed);
    assert!(!orch.is_running());
}

#[tokio::test]
async fn test_stage_context_carries_calibration_window() {
    let harness = TestHarness::new();
    harness.service.set_items(fixtures::data_items(1)).await;
    let aggregate = harness.stage(StageKind::Aggregate);
    let orch = harness.orchestrator(OrchestratorConfig::default(), vec![aggregate.clone()]);

    orch.run_scheduled(date(2025, 1, 2)).await.unwrap();

    let contexts = aggregate.contexts().await;
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].window.end_year, 2024);
    assert_eq!(contexts[0].window.end_month, "dec");
    assert_eq!(contexts[0].scales, vec![1, 3]);
    assert_eq!(contexts[0].paths, harness.paths);
}

#[tokio::test]
async fn test_mail_request_drives_remote_run() {
    let harness = TestHarness::new();
    harness.service.set_items(fixtures::data_items(2)).await;
    let orch = harness.orchestrator(OrchestratorConfig::default(), harness.standard_stages());

    let mailbox = Arc::new(MockMailbox::new());
    mailbox
        .add_message(
            "12",
            fixtures::request_mail(
                "<req-1@example.org>",
                "DESCARGAR",
                "Hola,\nFecha de inicio: 2024-02-01\nFecha de fin: 2024-02-10\n",
            ),
        )
        .await;
    let channel = CommandChannel::new(
        mailbox.clone(),
        MailboxConfig::new("pipeline@example.org", "operator@example.org"),
        Some(Arc::clone(&harness.history) as Arc<dyn ProcessedMessages>),
    );

    let request = channel.poll().await.unwrap().expect("request");
    let run = orch.run_request(&request, date(2024, 3, 10)).await.unwrap();

    assert_eq!(run.mode, RunMode::RemoteTriggered);
    assert_eq!(
        run.range,
        DateRange::new(date(2024, 2, 1), date(2024, 2, 10)).unwrap()
    );
    assert_eq!(run.phase, PipelinePhase::Completed);
    assert_eq!(mailbox.seen_uids().await, vec!["12".to_string()]);
    assert!(channel.poll().await.unwrap().is_none());
}
