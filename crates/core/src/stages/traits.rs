//! Trait definitions for pipeline stages.

use async_trait::async_trait;

use super::error::StageError;
use super::types::{StageContext, StageKind, StageReport};

/// One step of the pipeline, run after the download phase.
///
/// A stage returns only once its work is finished; the orchestrator then
/// checks the reported outputs before starting the next one.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    /// Whether the stage talks to a remote service and should be gated on
    /// connectivity.
    fn requires_network(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &StageContext) -> Result<StageReport, StageError>;
}
