//! Job lifecycle on top of a [`SubsetService`]: submit, poll, paginate,
//! partition and download.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::config::SubsetConfig;
use super::error::SubsetError;
use super::traits::SubsetService;
use super::types::{
    DownloadJob, DownloadSummary, FailedDownload, JobResults, PartitionedResults, ResultItem,
    SubsetRequest,
};

/// Drives remote subset jobs to completion and fetches their files.
pub struct SubsetJobClient {
    service: Arc<dyn SubsetService>,
    config: SubsetConfig,
}

impl SubsetJobClient {
    pub fn new(service: Arc<dyn SubsetService>, config: SubsetConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &SubsetConfig {
        &self.config
    }

    /// Builds the request for a date range using the configured dataset,
    /// variable and region.
    pub fn request_for(&self, begin: NaiveDate, end: NaiveDate) -> SubsetRequest {
        SubsetRequest {
            dataset: self.config.dataset.clone(),
            variable: self.config.variable.clone(),
            begin,
            end,
            bounding_box: self.config.bounding_box,
            crop: self.config.crop,
        }
    }

    /// Submits a job for `[begin, end]`.
    pub async fn submit(&self, begin: NaiveDate, end: NaiveDate) -> Result<DownloadJob, SubsetError> {
        let request = self.request_for(begin, end);
        let report = self.service.submit(&request).await?;
        info!(
            job_id = %report.job_id,
            status = %report.status,
            begin = %begin,
            end = %end,
            "Subset job submitted"
        );
        Ok(DownloadJob::from_report(report))
    }

    /// Polls until the job reaches a terminal state.
    ///
    /// Exactly one status request is issued per non-terminal state observed,
    /// each after the configured poll interval.
    pub async fn await_completion(&self, job: DownloadJob) -> Result<DownloadJob, SubsetError> {
        let max_wait = self.config.max_wait_secs;
        let job = if max_wait == 0 {
            self.poll_until_terminal(job).await?
        } else {
            tokio::time::timeout(Duration::from_secs(max_wait), self.poll_until_terminal(job))
                .await
                .map_err(|_| {
                    SubsetError::Timeout(format!("job did not finish within {}s", max_wait))
                })??
        };

        if job.status == super::types::JobStatus::Failed {
            return Err(SubsetError::RemoteJobFailed {
                reason: job
                    .message
                    .clone()
                    .unwrap_or_else(|| "no reason reported".to_string()),
                job_id: job.job_id,
            });
        }
        Ok(job)
    }

    async fn poll_until_terminal(&self, mut job: DownloadJob) -> Result<DownloadJob, SubsetError> {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        while !job.status.is_terminal() {
            tokio::time::sleep(interval).await;
            let report = self.service.status(&job.job_id).await?;
            job.apply(report);
            info!(
                job_id = %job.job_id,
                status = %job.status,
                percent_completed = job.percent_completed,
                "Subset job progress"
            );
        }
        Ok(job)
    }

    /// Collects every result item of a finished job.
    ///
    /// Pages are requested with an explicit start index that advances by the
    /// number of items actually received, until that count reaches the
    /// server's total. Items are kept once per link; a page made only of
    /// links already seen means the server ignored the start index and is
    /// reported as a malformed response. The plain-text listing is fetched
    /// afterwards for cross-checking only; its failure is logged and ignored.
    pub async fn fetch_results(&self, job: &mut DownloadJob) -> Result<Vec<ResultItem>, SubsetError> {
        let batch = self.config.batch_size.max(1);
        let mut items: Vec<ResultItem> = Vec::new();
        let mut links: HashSet<String> = HashSet::new();
        let mut received = 0usize;

        loop {
            let page = self
                .service
                .result_page(&job.job_id, received, batch)
                .await?;
            let total = page.total_results;
            debug!(
                job_id = %job.job_id,
                start_index = received,
                received = page.items.len(),
                total,
                "Result page"
            );

            if page.items.is_empty() {
                if received < total {
                    return Err(SubsetError::malformed(format!(
                        "empty result page at index {} of {}",
                        received, total
                    )));
                }
                break;
            }

            let start_index = received;
            received += page.items.len();
            let before = items.len();
            items.extend(
                page.items
                    .into_iter()
                    .filter(|item| links.insert(item.link.clone())),
            );
            if items.len() == before {
                return Err(SubsetError::malformed(format!(
                    "result page at index {} repeats earlier items",
                    start_index
                )));
            }
            if received >= total {
                break;
            }
        }

        match self.service.result_listing(&job.job_id).await {
            Ok(lines) => {
                if lines.len() != items.len() {
                    warn!(
                        job_id = %job.job_id,
                        listed = lines.len(),
                        paged = items.len(),
                        "Result listing does not match paged results"
                    );
                }
                for line in &lines {
                    debug!(job_id = %job.job_id, url = %line, "Listed result");
                }
            }
            Err(e) => warn!(job_id = %job.job_id, error = %e, "Result listing unavailable"),
        }

        job.result_items = items.clone();
        Ok(items)
    }

    /// Splits results into documentation and data items.
    pub fn partition(results: Vec<ResultItem>) -> PartitionedResults {
        let (data_items, documentation) = results.into_iter().partition(ResultItem::is_data);
        PartitionedResults {
            documentation,
            data_items,
        }
    }

    /// Downloads every data item into `destination`.
    ///
    /// A failed URL is recorded with its cause and the batch continues.
    pub async fn download_all(
        &self,
        items: &[ResultItem],
        destination: &Path,
    ) -> Result<DownloadSummary, SubsetError> {
        tokio::fs::create_dir_all(destination).await?;

        let mut summary = DownloadSummary {
            attempted: items.len(),
            ..Default::default()
        };

        for item in items {
            let Some(name) = local_file_name(item) else {
                warn!(url = %item.link, "No usable file name for result item");
                summary.failed.push(FailedDownload {
                    url: item.link.clone(),
                    label: item.label.clone(),
                    cause: "no usable file name".to_string(),
                });
                continue;
            };

            let dest = destination.join(&name);
            match self.service.download(&item.link, &dest).await {
                Ok(bytes) => {
                    debug!(file = %dest.display(), bytes, "Downloaded");
                    summary.succeeded += 1;
                    summary.files.push(dest);
                }
                Err(e) => {
                    warn!(url = %item.link, error = %e, "Download failed");
                    summary.failed.push(FailedDownload {
                        url: item.link.clone(),
                        label: item.label.clone(),
                        cause: e.to_string(),
                    });
                }
            }
        }

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            "Download batch finished"
        );
        Ok(summary)
    }

    /// Submits, waits, and collects the partitioned results for a range.
    pub async fn request_items(
        &self,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<JobResults, SubsetError> {
        let job = self.submit(begin, end).await?;
        let mut job = self.await_completion(job).await?;
        let results = self.fetch_results(&mut job).await?;
        let PartitionedResults {
            documentation,
            data_items,
        } = Self::partition(results);

        if data_items.is_empty() {
            info!(job_id = %job.job_id, "Job finished with no data items");
        }

        Ok(JobResults {
            job,
            documentation,
            data_items,
        })
    }
}

/// File name for a result item: its label, else the last URL path segment.
fn local_file_name(item: &ResultItem) -> Option<PathBuf> {
    let from_label = Path::new(item.label.trim()).file_name().map(PathBuf::from);
    from_label.or_else(|| {
        let path = item.link.split(['?', '#']).next()?;
        let segment = path.rsplit('/').next()?;
        Path::new(segment).file_name().map(PathBuf::from)
    })
}
