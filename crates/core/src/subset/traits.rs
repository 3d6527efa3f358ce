//! Trait definitions for the subset module.

use async_trait::async_trait;
use std::path::Path;

use super::error::{DownloadError, SubsetError};
use super::types::{ResultPage, StatusReport, SubsetRequest};

/// Remote job-submission/polling service.
#[async_trait]
pub trait SubsetService: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Submits a subset request; the report carries the new job id.
    async fn submit(&self, request: &SubsetRequest) -> Result<StatusReport, SubsetError>;

    /// Reads the current status of a job.
    async fn status(&self, job_id: &str) -> Result<StatusReport, SubsetError>;

    /// Reads one page of results starting at `start_index`.
    async fn result_page(
        &self,
        job_id: &str,
        start_index: usize,
        count: usize,
    ) -> Result<ResultPage, SubsetError>;

    /// Plain-text listing of result URLs, one per line.
    async fn result_listing(&self, job_id: &str) -> Result<Vec<String>, SubsetError>;

    /// Downloads `url` into `dest`, returning the bytes written.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, DownloadError>;
}
