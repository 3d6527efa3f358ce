//! Run state for the pipeline orchestrator.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::calendar::CalibrationWindow;
use crate::stages::StageKind;

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Daily scheduled run; may purge the staging area.
    Scheduled,
    /// Operator request received by mail; never purges.
    RemoteTriggered,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::RemoteTriggered => "remote_triggered",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline state machine.
///
/// `Idle → Downloading → Aggregating → Concatenating → ComputingIndex →
/// Publishing → Notifying → {Completed | Failed}`. Any known error jumps
/// straight to `Notifying` and ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Idle,
    Downloading,
    Aggregating,
    Concatenating,
    ComputingIndex,
    Publishing,
    Notifying,
    Completed,
    Failed,
}

impl PipelinePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Inclusive range of days to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` if `begin` is after `end`.
    pub fn new(begin: NaiveDate, end: NaiveDate) -> Option<Self> {
        (begin <= end).then_some(Self { begin, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            begin: day,
            end: day,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.begin == self.end {
            write!(f, "{}", self.begin)
        } else {
            write!(f, "{} to {}", self.begin, self.end)
        }
    }
}

/// Error taxonomy reported to operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    RemoteJobFailed,
    MalformedApiResponse,
    ResponseDecodeError,
    NameResolutionFailure,
    ConnectionRetriesExhausted,
    RequestTimeout,
    /// Soft condition: the job succeeded with nothing to download.
    ZeroResultsCondition,
    PublishServiceError,
    /// Only ever logged; a failed notification never fails a run.
    NotificationSendError,
    /// A delegated stage exited unsuccessfully or left no output.
    StageFailed,
    UnexpectedError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteJobFailed => "RemoteJobFailed",
            Self::MalformedApiResponse => "MalformedApiResponse",
            Self::ResponseDecodeError => "ResponseDecodeError",
            Self::NameResolutionFailure => "NameResolutionFailure",
            Self::ConnectionRetriesExhausted => "ConnectionRetriesExhausted",
            Self::RequestTimeout => "RequestTimeout",
            Self::ZeroResultsCondition => "ZeroResultsCondition",
            Self::PublishServiceError => "PublishServiceError",
            Self::NotificationSendError => "NotificationSendError",
            Self::StageFailed => "StageFailed",
            Self::UnexpectedError => "UnexpectedError",
        }
    }

    /// Failures of the download phase, subject to the abort policy.
    pub fn is_download_error(&self) -> bool {
        matches!(
            self,
            Self::RemoteJobFailed
                | Self::MalformedApiResponse
                | Self::ResponseDecodeError
                | Self::NameResolutionFailure
                | Self::ConnectionRetriesExhausted
                | Self::RequestTimeout
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first error of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: ErrorKind,
    pub message: String,
}

/// How a finished run is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    CompletedNoData,
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CompletedNoData => "no_data",
            Self::Failed => "failed",
        }
    }
}

/// Record of one pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: String,
    pub mode: RunMode,
    pub range: DateRange,
    pub reset_requested: bool,
    pub phase: PipelinePhase,
    pub stages_completed: Vec<StageKind>,
    /// At most one; later errors are only logged.
    pub error: Option<RunError>,
    pub items_downloaded: usize,
    pub items_failed: usize,
    /// Zero data items on a successful job.
    pub no_data: bool,
    /// Soft conditions noted along the way; they never fail the run.
    #[serde(default)]
    pub conditions: Vec<ErrorKind>,
    pub calibration: Option<CalibrationWindow>,
    pub latest_data_date: Option<NaiveDate>,
    pub reset_date: Option<NaiveDate>,
    pub notified: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(mode: RunMode, range: DateRange, reset_requested: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            mode,
            range,
            reset_requested,
            phase: PipelinePhase::Idle,
            stages_completed: Vec::new(),
            error: None,
            items_downloaded: 0,
            items_failed: 0,
            no_data: false,
            conditions: Vec::new(),
            calibration: None,
            latest_data_date: None,
            reset_date: None,
            notified: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Records an error unless one is already held. Returns whether it was
    /// recorded.
    pub fn record_error(&mut self, kind: ErrorKind, message: impl Into<String>) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.error = Some(RunError {
            kind,
            message: message.into(),
        });
        true
    }

    /// Notes a soft condition once.
    pub fn note(&mut self, kind: ErrorKind) {
        if !self.conditions.contains(&kind) {
            self.conditions.push(kind);
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.error.is_some() {
            RunOutcome::Failed
        } else if self.no_data {
            RunOutcome::CompletedNoData
        } else {
            RunOutcome::Completed
        }
    }
}
