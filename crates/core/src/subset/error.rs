//! Error types for the subset module.

use thiserror::Error;

/// Errors raised while talking to the subset service.
#[derive(Debug, Error)]
pub enum SubsetError {
    /// The remote job finished in the Failed state.
    #[error("Remote job {job_id} failed: {reason}")]
    RemoteJobFailed { job_id: String, reason: String },

    /// The service answered with a fault or an unexpected shape.
    #[error("Malformed API response: {0}")]
    MalformedApiResponse(String),

    /// The response body was not valid JSON.
    #[error("Failed to decode response: {0}")]
    ResponseDecode(String),

    /// The service host could not be resolved.
    #[error("Name resolution failed: {0}")]
    NameResolution(String),

    /// The connection could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A request or the overall job wait exceeded its timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status from the JSON-WSP endpoint.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Local I/O failure while storing downloads.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a single file download. Recorded per URL; never aborts a batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DownloadError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("transport: {0}")]
    Transport(String),

    #[error("write failed: {0}")]
    Write(String),
}

impl SubsetError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedApiResponse(reason.into())
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::ResponseDecode(reason.into())
    }

    /// Maps a transport error onto the taxonomy.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        if err.is_connect() {
            let text = error_chain(&err);
            if looks_like_dns_failure(&text) {
                return Self::NameResolution(text);
            }
            return Self::ConnectionFailed(text);
        }
        if err.is_decode() {
            return Self::ResponseDecode(err.to_string());
        }
        Self::ConnectionFailed(error_chain(&err))
    }

    /// Whether the next invocation may succeed without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NameResolution(_) | Self::ConnectionFailed(_) | Self::Timeout(_)
        )
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

fn looks_like_dns_failure(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("dns")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
        || lower.contains("temporary failure in name resolution")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_detection() {
        assert!(looks_like_dns_failure(
            "error sending request: dns error: failed to lookup address information"
        ));
        assert!(!looks_like_dns_failure("connection refused"));
    }

    #[test]
    fn test_retryable() {
        assert!(SubsetError::Timeout("poll".into()).is_retryable());
        assert!(!SubsetError::malformed("fault").is_retryable());
        assert!(!SubsetError::RemoteJobFailed {
            job_id: "j".into(),
            reason: "r".into()
        }
        .is_retryable());
    }
}
