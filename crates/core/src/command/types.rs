//! Types for the command channel.

use serde::{Deserialize, Serialize};

use crate::orchestrator::DateRange;

/// A raw message fetched from the mailbox.
#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    /// Server-side handle used to flag the message.
    pub uid: String,
    /// Full RFC 822 source.
    pub raw: Vec<u8>,
}

/// An operator request for an on-demand run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub sender: String,
    pub subject_matched: bool,
    pub range: DateRange,
    /// `Message-ID` header, or the mailbox uid when the header is absent.
    pub message_id: String,
}
