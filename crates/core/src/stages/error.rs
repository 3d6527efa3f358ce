//! Error types for pipeline stages.

use std::path::PathBuf;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::publish::PublishError;

use super::types::StageKind;

/// Errors raised by a pipeline stage.
#[derive(Debug, Error)]
pub enum StageError {
    /// The configured program does not exist.
    #[error("{stage}: program not found: {program}")]
    ProgramNotFound { stage: StageKind, program: String },

    /// The program exited unsuccessfully.
    #[error("{stage}: exited with code {code:?}")]
    CommandFailed {
        stage: StageKind,
        code: Option<i32>,
        stderr: Option<String>,
    },

    /// The program did not finish in time and was killed.
    #[error("{stage}: timed out after {timeout_secs} seconds")]
    Timeout { stage: StageKind, timeout_secs: u64 },

    /// A declared output did not appear, or kept changing size.
    #[error("output not ready: {path}")]
    OutputNotReady { path: PathBuf },

    /// A template referenced an unknown placeholder.
    #[error("unknown placeholder {{{name}}} in {template:?}")]
    UnknownPlaceholder { name: String, template: String },

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    pub fn command_failed(stage: StageKind, code: Option<i32>, stderr: &[u8]) -> Self {
        let text = String::from_utf8_lossy(stderr);
        let tail: Vec<&str> = text.lines().rev().take(10).collect();
        let stderr = if tail.is_empty() {
            None
        } else {
            Some(tail.into_iter().rev().collect::<Vec<_>>().join("\n"))
        };
        Self::CommandFailed {
            stage,
            code,
            stderr,
        }
    }

    /// Whether the next invocation may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::OutputNotReady { .. } | Self::Io(_) => true,
            Self::Publish(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_keeps_stderr_tail() {
        let stderr: String = (1..=15).map(|i| format!("line {}\n", i)).collect();
        let err = StageError::command_failed(StageKind::Aggregate, Some(2), stderr.as_bytes());
        match err {
            StageError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, Some(2));
                let stderr = stderr.unwrap();
                assert!(stderr.starts_with("line 6"));
                assert!(stderr.ends_with("line 15"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_empty_stderr() {
        let err = StageError::command_failed(StageKind::Archive, None, b"");
        assert!(matches!(err, StageError::CommandFailed { stderr: None, .. }));
    }
}
