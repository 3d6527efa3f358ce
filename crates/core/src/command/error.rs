//! Error types for the command channel.

use thiserror::Error;

/// Errors raised while polling the command mailbox.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MailboxError {
    #[error("mailbox connection failed: {0}")]
    Connection(String),

    #[error("mailbox login rejected: {0}")]
    Authentication(String),

    #[error("mailbox protocol error: {0}")]
    Protocol(String),

    #[error("message could not be parsed: {0}")]
    Parse(String),

    #[error("processed-message store error: {0}")]
    Store(String),

    #[error("mailbox task aborted: {0}")]
    Task(String),
}

impl MailboxError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Protocol(_) | Self::Task(_))
    }
}

impl From<imap::Error> for MailboxError {
    fn from(err: imap::Error) -> Self {
        match err {
            imap::Error::Io(e) => Self::Connection(e.to_string()),
            imap::Error::Tls(e) => Self::Connection(e.to_string()),
            imap::Error::TlsHandshake(e) => Self::Connection(e.to_string()),
            imap::Error::No(msg) | imap::Error::Bad(msg) => Self::Protocol(msg),
            other => Self::Protocol(other.to_string()),
        }
    }
}
