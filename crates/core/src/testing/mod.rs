//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of all external service traits,
//! allowing whole pipeline runs to be tested without real infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use droughtwatch_core::testing::{fixtures, MockNotifier, MockProbe, MockSubsetService};
//!
//! let service = MockSubsetService::new();
//! let probe = MockProbe::new(true);
//! let notifier = MockNotifier::new();
//!
//! // Configure mock responses
//! service.set_items(fixtures::data_items(10)).await;
//!
//! // Build an orchestrator around them...
//! ```

mod mock_mailbox;
mod mock_notify;
mod mock_publisher;
mod mock_stage;
mod mock_subset;

pub use mock_mailbox::MockMailbox;
pub use mock_notify::{MockNotifier, MockProbe, SentNotification};
pub use mock_publisher::MockRasterPublisher;
pub use mock_stage::{MockStage, StageLog};
pub use mock_subset::{MockSubsetService, MOCK_JOB_ID};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{Days, NaiveDate};

    use crate::subset::{JobStatus, ResultItem, StatusReport};

    /// Create a status report with progress matching the status.
    pub fn status_report(job_id: &str, status: JobStatus) -> StatusReport {
        StatusReport {
            job_id: job_id.to_string(),
            status,
            percent_completed: Some(match status {
                JobStatus::Accepted => 0.0,
                JobStatus::Running => 50.0,
                JobStatus::Succeeded | JobStatus::Failed => 100.0,
            }),
            message: None,
        }
    }

    /// Day covered by [`data_item`]`(index)`.
    pub fn data_item_date(index: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.checked_add_days(Days::new(index as u64)))
            .unwrap_or_default()
    }

    /// Create a daily data file entry; the label carries its `YYYYMMDD` date.
    pub fn data_item(index: usize) -> ResultItem {
        let day = data_item_date(index);
        let label = format!(
            "3B-DAY.MS.MRG.3IMERG.{}-S000000-E235959.V07B.nc4",
            day.format("%Y%m%d")
        );
        ResultItem {
            link: format!("https://data.example.org/imerg/{}", label),
            label,
            start: Some(format!("{}T00:00:00.000Z", day)),
            end: Some(format!("{}T23:59:59.999Z", day)),
        }
    }

    /// Create `n` data items for consecutive days.
    pub fn data_items(n: usize) -> Vec<ResultItem> {
        (0..n).map(data_item).collect()
    }

    /// Create a documentation entry (no start or end).
    pub fn documentation_item(label: &str) -> ResultItem {
        ResultItem {
            label: label.to_string(),
            link: format!("https://data.example.org/docs/{}", label),
            start: None,
            end: None,
        }
    }

    /// Create a raw plain-text mail from the trusted operator.
    pub fn request_mail(message_id: &str, subject: &str, body: &str) -> Vec<u8> {
        format!(
            "From: operator@example.org\r\n\
             To: pipeline@example.org\r\n\
             Subject: {}\r\n\
             Message-ID: {}\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n\
             {}",
            subject,
            message_id,
            body.replace('\n', "\r\n")
        )
        .into_bytes()
    }
}
