//! Client for the asynchronous subset job service.
//!
//! A job is submitted for a date range and region, polled until it is
//! terminal, then its results are paged in and split into documentation and
//! data items. Data items are downloaded one by one into the raw staging
//! area; individual failures are recorded without stopping the batch.
//!
//! # Example
//!
//! ```ignore
//! use droughtwatch_core::subset::{HttpSubsetService, SubsetConfig, SubsetJobClient};
//!
//! let config = SubsetConfig::default();
//! let service = Arc::new(HttpSubsetService::new(&config)?);
//! let client = SubsetJobClient::new(service, config);
//!
//! let results = client.request_items(begin, end).await?;
//! let summary = client.download_all(&results.data_items, staging.root()).await?;
//! ```

mod client;
mod config;
mod error;
mod http;
mod traits;
mod types;

pub use client::SubsetJobClient;
pub use config::SubsetConfig;
pub use error::{DownloadError, SubsetError};
pub use http::HttpSubsetService;
pub use traits::SubsetService;
pub use types::{
    BoundingBox, DownloadJob, DownloadSummary, FailedDownload, JobResults, JobStatus,
    PartitionedResults, ResultItem, ResultPage, StatusReport, SubsetRequest,
};
