//! Configuration for the subset job client.

use serde::{Deserialize, Serialize};

use super::types::BoundingBox;

/// Remote subset service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetConfig {
    /// JSON-WSP endpoint receiving subset/status/result calls.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Base URL of the plain-text result listing (`<base>/<job_id>`).
    #[serde(default = "default_results_url")]
    pub results_url: String,

    /// Dataset identifier requested from the service.
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Variable to extract.
    #[serde(default = "default_variable")]
    pub variable: String,

    /// Region of interest.
    #[serde(default)]
    pub bounding_box: BoundingBox,

    /// Ask the service to crop to the bounding box.
    #[serde(default = "default_true")]
    pub crop: bool,

    /// Result page size.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between status polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on time spent waiting for a job, in seconds. Zero disables it.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Timeout for a single HTTP request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Days between an observation and its availability.
    #[serde(default = "default_publication_lag_days")]
    pub publication_lag_days: u64,

    /// Page linked from download failure reports.
    #[serde(default = "default_help_url")]
    pub help_url: String,

    /// Page linked from API failure reports.
    #[serde(default = "default_status_url")]
    pub status_url: String,
}

fn default_endpoint() -> String {
    "https://disc.gsfc.nasa.gov/service/subset/jsonwsp".to_string()
}

fn default_results_url() -> String {
    "https://disc.gsfc.nasa.gov/api/jobs/results".to_string()
}

fn default_dataset() -> String {
    "GPM_3IMERGDL_07".to_string()
}

fn default_variable() -> String {
    "precipitation".to_string()
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    20
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_max_wait_secs() -> u64 {
    3_600
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_publication_lag_days() -> u64 {
    2
}

fn default_help_url() -> String {
    "https://disc.gsfc.nasa.gov/information/documents?title=Data%20Access".to_string()
}

fn default_status_url() -> String {
    "https://disc.gsfc.nasa.gov/information/alerts".to_string()
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            results_url: default_results_url(),
            dataset: default_dataset(),
            variable: default_variable(),
            bounding_box: BoundingBox::default(),
            crop: true,
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            publication_lag_days: default_publication_lag_days(),
            help_url: default_help_url(),
            status_url: default_status_url(),
        }
    }
}
