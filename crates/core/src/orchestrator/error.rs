//! Orchestrator errors and the mapping of module errors onto the
//! operator-facing taxonomy.

use thiserror::Error;

use crate::calendar::CalendarError;
use crate::stages::StageError;
use crate::subset::SubsetError;

use super::types::ErrorKind;

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Another run holds the run guard.
    #[error("a pipeline run is already in progress")]
    RunInProgress,

    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

impl SubsetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RemoteJobFailed { .. } => ErrorKind::RemoteJobFailed,
            Self::MalformedApiResponse(_) | Self::Http { .. } => ErrorKind::MalformedApiResponse,
            Self::ResponseDecode(_) => ErrorKind::ResponseDecodeError,
            Self::NameResolution(_) => ErrorKind::NameResolutionFailure,
            Self::ConnectionFailed(_) => ErrorKind::ConnectionRetriesExhausted,
            Self::Timeout(_) => ErrorKind::RequestTimeout,
            Self::Io(_) => ErrorKind::UnexpectedError,
        }
    }
}

impl StageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Publish(_) => ErrorKind::PublishServiceError,
            _ => ErrorKind::StageFailed,
        }
    }
}
