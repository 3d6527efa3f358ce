//! Final status message of a run.

use crate::staging::describe_date;

use super::types::{ErrorKind, PipelineRun, RunMode, RunOutcome};

/// Where operators are pointed when a run fails.
#[derive(Debug, Clone, Default)]
pub struct RemediationHints {
    /// Data access help, for download failures.
    pub help_url: String,
    /// Service status page, for API failures.
    pub status_url: String,
}

impl RemediationHints {
    fn for_kind(&self, kind: ErrorKind) -> Option<&str> {
        let url = match kind {
            ErrorKind::RemoteJobFailed
            | ErrorKind::NameResolutionFailure
            | ErrorKind::ConnectionRetriesExhausted
            | ErrorKind::RequestTimeout => &self.help_url,
            ErrorKind::MalformedApiResponse | ErrorKind::ResponseDecodeError => &self.status_url,
            _ => return None,
        };
        (!url.is_empty()).then_some(url.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub subject: String,
    pub body: String,
}

/// Builds the notification for a finished run.
pub fn compose(run: &PipelineRun, prefix: &str, hints: &RemediationHints) -> RunReport {
    let headline = match run.outcome() {
        RunOutcome::Completed => "Pipeline completed".to_string(),
        RunOutcome::CompletedNoData => "Pipeline completed with no new data".to_string(),
        RunOutcome::Failed => match &run.error {
            Some(error) => format!("Pipeline failed: {}", error.kind),
            None => "Pipeline failed".to_string(),
        },
    };

    let mut subject = String::new();
    if !prefix.is_empty() {
        subject.push_str(prefix);
        subject.push(' ');
    }
    if run.mode == RunMode::RemoteTriggered {
        subject.push_str(&format!("[remote request {}] ", run.range));
    }
    subject.push_str(&headline);

    let mut lines = vec![
        format!("Run: {}", run.id),
        format!("Mode: {}", run.mode),
        format!("Requested dates: {}", run.range),
    ];
    if run.reset_requested {
        lines.push("Staging area was reset for a new calibration cycle.".to_string());
    }
    if let Some(window) = &run.calibration {
        lines.push(format!("Calibration window: {}", window.label()));
    }

    if run.no_data {
        lines.push("The data service returned no files for the requested dates.".to_string());
    } else {
        lines.push(format!("Files downloaded: {}", run.items_downloaded));
    }
    if run.items_failed > 0 {
        lines.push(format!("Files failed: {}", run.items_failed));
    }

    let stages = if run.stages_completed.is_empty() {
        "none".to_string()
    } else {
        run.stages_completed
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    lines.push(format!("Stages completed: {}", stages));

    if let Some(error) = &run.error {
        lines.push(String::new());
        lines.push(format!("Error ({}): {}", error.kind, error.message));
        if let Some(url) = hints.for_kind(error.kind) {
            lines.push(format!("See {}", url));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Latest data available: {}",
        describe_date(run.latest_data_date)
    ));
    lines.push(format!(
        "Next calibration reset: {}",
        describe_date(run.reset_date)
    ));

    RunReport {
        subject,
        body: lines.join("\n"),
    }
}
