//! Types exchanged with the subset service.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Geographic box in degrees, ordered west/south/east/north on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            west: -73.5,
            south: -55.0,
            east: -53.0,
            north: -21.0,
        }
    }
}

impl BoundingBox {
    pub fn as_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// True when the box has positive extent in both axes.
    pub fn is_valid(&self) -> bool {
        self.west < self.east && self.south < self.north
    }
}

/// What to ask the service for.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetRequest {
    pub dataset: String,
    pub variable: String,
    pub begin: NaiveDate,
    pub end: NaiveDate,
    pub bounding_box: BoundingBox,
    pub crop: bool,
}

/// Lifecycle of a remote subset job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Accepted,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Parses the status string reported by the service.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Accepted" => Some(Self::Accepted),
            "Running" => Some(Self::Running),
            "Succeeded" => Some(Self::Succeeded),
            "Failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Accepted => "Accepted",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// A single status observation.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub job_id: String,
    pub status: JobStatus,
    pub percent_completed: Option<f64>,
    pub message: Option<String>,
}

/// Client-side view of a remote job.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub job_id: String,
    pub status: JobStatus,
    pub percent_completed: f64,
    pub message: Option<String>,
    pub result_items: Vec<ResultItem>,
}

impl DownloadJob {
    pub fn from_report(report: StatusReport) -> Self {
        Self {
            job_id: report.job_id,
            status: report.status,
            percent_completed: report.percent_completed.unwrap_or(0.0).clamp(0.0, 100.0),
            message: report.message,
            result_items: Vec::new(),
        }
    }

    /// Applies a status observation.
    ///
    /// A terminal job never moves again; the observation is ignored and
    /// `false` returned.
    pub fn apply(&mut self, report: StatusReport) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = report.status;
        if let Some(percent) = report.percent_completed {
            self.percent_completed = percent.clamp(0.0, 100.0);
        }
        if report.message.is_some() {
            self.message = report.message;
        }
        true
    }
}

/// One entry of a job's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub label: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl ResultItem {
    /// Items with both a start and an end are data; everything else is
    /// documentation.
    pub fn is_data(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// A page of results as returned by the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultPage {
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: usize,
    #[serde(rename = "totalResults")]
    pub total_results: usize,
    #[serde(default)]
    pub items: Vec<ResultItem>,
}

/// Results split into documentation and data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionedResults {
    pub documentation: Vec<ResultItem>,
    pub data_items: Vec<ResultItem>,
}

/// A download that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDownload {
    pub url: String,
    pub label: String,
    pub cause: String,
}

/// Outcome of downloading a batch of data items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedDownload>,
    #[serde(skip)]
    pub files: Vec<PathBuf>,
}

impl DownloadSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Everything gathered for a finished job, before downloading.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResults {
    pub job: DownloadJob,
    pub documentation: Vec<ResultItem>,
    pub data_items: Vec<ResultItem>,
}

impl JobResults {
    /// A non-failed job with nothing to download.
    pub fn is_empty(&self) -> bool {
        self.data_items.is_empty()
    }
}
