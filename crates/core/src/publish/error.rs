//! Error types for the publish module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while publishing rasters.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publishing service returned HTTP {status} for {operation}: {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("publishing service unreachable: {0}")]
    ConnectionFailed(String),

    #[error("publishing request timed out")]
    Timeout,

    #[error("raster not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("invalid layer template: {0}")]
    Template(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PublishError {
    pub fn http(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            operation: operation.into(),
            status,
            body: body.into(),
        }
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::ConnectionFailed(err.to_string())
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed(_) | Self::Timeout => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
