//! Storage traits for run history.

use chrono::NaiveDate;
use thiserror::Error;

use crate::orchestrator::PipelineRun;

/// Errors from history storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Record of finished pipeline runs.
pub trait RunHistory: Send + Sync {
    /// Insert or replace a run by id.
    fn record_run(&self, run: &PipelineRun) -> Result<(), StoreError>;

    /// Most recently started runs first.
    fn recent_runs(&self, limit: usize) -> Result<Vec<PipelineRun>, StoreError>;
}

/// Ledger of command messages already handled, so a restart does not
/// replay an old request.
pub trait ProcessedMessages: Send + Sync {
    fn is_processed(&self, message_id: &str) -> Result<bool, StoreError>;

    /// Dates are `None` for messages discarded as malformed.
    fn mark_processed(
        &self,
        message_id: &str,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(), StoreError>;
}
