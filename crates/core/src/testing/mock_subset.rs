//! Mock subset service for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::subset::{
    DownloadError, JobStatus, ResultItem, ResultPage, StatusReport, SubsetError, SubsetRequest,
    SubsetService,
};

/// Job id handed out by every submit.
pub const MOCK_JOB_ID: &str = "mock-job";

/// Mock implementation of the SubsetService trait.
///
/// Provides controllable behavior for testing:
/// - Script the sequence of job statuses
/// - Serve a fixed result set, optionally with short pages or a wrong total
/// - Fail individual downloads
/// - Record submits, status polls, page requests and downloads
///
/// # Example
///
/// ```rust,ignore
/// use droughtwatch_core::testing::{fixtures, MockSubsetService};
///
/// let service = MockSubsetService::new();
/// service.push_statuses(vec![fixtures::status_report("mock-job", JobStatus::Running)]).await;
/// service.set_items(fixtures::data_items(45)).await;
///
/// // Use in a SubsetJobClient...
/// assert_eq!(service.status_calls().await, 1);
/// ```
#[derive(Debug)]
pub struct MockSubsetService {
    /// Status returned by submit.
    submit_status: Arc<RwLock<JobStatus>>,
    /// Scripted status reports, consumed in order.
    statuses: Arc<RwLock<VecDeque<StatusReport>>>,
    /// Status once the script is exhausted.
    default_status: Arc<RwLock<JobStatus>>,
    /// Full result set.
    items: Arc<RwLock<Vec<ResultItem>>>,
    /// Maximum items returned per page regardless of the requested count.
    page_cap: Arc<RwLock<Option<usize>>>,
    /// Total reported instead of the real item count.
    reported_total: Arc<RwLock<Option<usize>>>,
    /// Serve every page from index 0, like a server that drops `startIndex`.
    ignore_start_index: Arc<RwLock<bool>>,
    listing_unavailable: Arc<RwLock<bool>>,
    /// Download failures by URL.
    download_failures: Arc<RwLock<HashMap<String, DownloadError>>>,
    /// If set, the next submit, status or page call fails with this error.
    next_error: Arc<RwLock<Option<SubsetError>>>,

    submitted: Arc<RwLock<Vec<SubsetRequest>>>,
    status_calls: Arc<RwLock<usize>>,
    page_requests: Arc<RwLock<Vec<(usize, usize)>>>,
    downloaded: Arc<RwLock<Vec<String>>>,
}

impl Default for MockSubsetService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSubsetService {
    /// Create a mock whose jobs are accepted, then succeed on the first poll
    /// with no results.
    pub fn new() -> Self {
        Self {
            submit_status: Arc::new(RwLock::new(JobStatus::Accepted)),
            statuses: Arc::new(RwLock::new(VecDeque::new())),
            default_status: Arc::new(RwLock::new(JobStatus::Succeeded)),
            items: Arc::new(RwLock::new(Vec::new())),
            page_cap: Arc::new(RwLock::new(None)),
            reported_total: Arc::new(RwLock::new(None)),
            ignore_start_index: Arc::new(RwLock::new(false)),
            listing_unavailable: Arc::new(RwLock::new(false)),
            download_failures: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            submitted: Arc::new(RwLock::new(Vec::new())),
            status_calls: Arc::new(RwLock::new(0)),
            page_requests: Arc::new(RwLock::new(Vec::new())),
            downloaded: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the status returned by submit.
    pub async fn set_submit_status(&self, status: JobStatus) {
        *self.submit_status.write().await = status;
    }

    /// Queue status reports returned by successive polls.
    pub async fn push_statuses(&self, reports: Vec<StatusReport>) {
        self.statuses.write().await.extend(reports);
    }

    /// Set the status returned once queued reports run out.
    pub async fn set_default_status(&self, status: JobStatus) {
        *self.default_status.write().await = status;
    }

    /// Set the full result set served by result pages.
    pub async fn set_items(&self, items: Vec<ResultItem>) {
        *self.items.write().await = items;
    }

    /// Limit how many items a page may carry.
    pub async fn set_page_cap(&self, cap: Option<usize>) {
        *self.page_cap.write().await = cap;
    }

    /// Report a total that differs from the real item count.
    pub async fn set_reported_total(&self, total: Option<usize>) {
        *self.reported_total.write().await = total;
    }

    /// Serve every page from the first item.
    pub async fn set_ignore_start_index(&self, ignore: bool) {
        *self.ignore_start_index.write().await = ignore;
    }

    /// Make the plain-text listing fail.
    pub async fn set_listing_unavailable(&self, unavailable: bool) {
        *self.listing_unavailable.write().await = unavailable;
    }

    /// Make downloads of `url` fail with `error`.
    pub async fn fail_download(&self, url: &str, error: DownloadError) {
        self.download_failures
            .write()
            .await
            .insert(url.to_string(), error);
    }

    /// Configure the next submit, status or page call to fail.
    pub async fn set_next_error(&self, error: SubsetError) {
        *self.next_error.write().await = Some(error);
    }

    /// Requests submitted so far.
    pub async fn submitted(&self) -> Vec<SubsetRequest> {
        self.submitted.read().await.clone()
    }

    /// Number of status polls.
    pub async fn status_calls(&self) -> usize {
        *self.status_calls.read().await
    }

    /// `(start_index, count)` of every page request.
    pub async fn page_requests(&self) -> Vec<(usize, usize)> {
        self.page_requests.read().await.clone()
    }

    /// Every URL a download was attempted for, failed ones included.
    pub async fn downloaded_urls(&self) -> Vec<String> {
        self.downloaded.read().await.clone()
    }

    async fn take_error(&self) -> Result<(), SubsetError> {
        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn report(status: JobStatus) -> StatusReport {
    StatusReport {
        job_id: MOCK_JOB_ID.to_string(),
        status,
        percent_completed: Some(if status == JobStatus::Succeeded { 100.0 } else { 0.0 }),
        message: None,
    }
}

#[async_trait]
impl SubsetService for MockSubsetService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn submit(&self, request: &SubsetRequest) -> Result<StatusReport, SubsetError> {
        self.take_error().await?;
        self.submitted.write().await.push(request.clone());
        Ok(report(*self.submit_status.read().await))
    }

    async fn status(&self, _job_id: &str) -> Result<StatusReport, SubsetError> {
        *self.status_calls.write().await += 1;
        self.take_error().await?;
        if let Some(next) = self.statuses.write().await.pop_front() {
            return Ok(next);
        }
        Ok(report(*self.default_status.read().await))
    }

    async fn result_page(
        &self,
        _job_id: &str,
        start_index: usize,
        count: usize,
    ) -> Result<ResultPage, SubsetError> {
        self.page_requests.write().await.push((start_index, count));
        self.take_error().await?;

        let items = self.items.read().await;
        let take = match *self.page_cap.read().await {
            Some(cap) => count.min(cap),
            None => count,
        };
        let start = if *self.ignore_start_index.read().await {
            0
        } else {
            start_index.min(items.len())
        };
        let end = (start + take).min(items.len());

        Ok(ResultPage {
            items_per_page: count,
            total_results: self.reported_total.read().await.unwrap_or(items.len()),
            items: items[start..end].to_vec(),
        })
    }

    async fn result_listing(&self, _job_id: &str) -> Result<Vec<String>, SubsetError> {
        if *self.listing_unavailable.read().await {
            return Err(SubsetError::ConnectionFailed("listing unavailable".to_string()));
        }
        Ok(self
            .items
            .read()
            .await
            .iter()
            .map(|item| item.link.clone())
            .collect())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        self.downloaded.write().await.push(url.to_string());
        if let Some(error) = self.download_failures.read().await.get(url) {
            return Err(error.clone());
        }
        let content = format!("mock data from {}", url);
        tokio::fs::write(dest, content.as_bytes())
            .await
            .map_err(|e| DownloadError::Write(e.to_string()))?;
        Ok(content.len() as u64)
    }
}
