//! Trait definitions for the command channel.

use async_trait::async_trait;

use super::error::MailboxError;
use super::types::MailMessage;

/// A mailbox holding operator requests.
#[async_trait]
pub trait Mailbox: Send + Sync {
    fn name(&self) -> &str;

    /// Unseen messages from `sender`, oldest first, without flagging them.
    async fn fetch_unseen_from(&self, sender: &str) -> Result<Vec<MailMessage>, MailboxError>;

    /// Flags a message as seen on the server.
    async fn mark_seen(&self, uid: &str) -> Result<(), MailboxError>;
}
