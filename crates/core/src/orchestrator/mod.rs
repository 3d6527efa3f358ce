//! Pipeline orchestrator.
//!
//! A run moves through `Downloading`, the delegated stages, and `Notifying`
//! before ending in `Completed` or `Failed`. Only the first error of a run is
//! kept; it decides the final report. Runs never overlap: a second caller is
//! turned away with [`OrchestratorError::RunInProgress`].

mod config;
mod error;
mod report;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use report::{compose, RemediationHints, RunReport};
pub use runner::{PipelineOrchestrator, RunPermit};
pub use types::{
    DateRange, ErrorKind, PipelinePhase, PipelineRun, RunError, RunMode, RunOutcome,
};
