//! Mock mailbox for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::command::{MailMessage, Mailbox, MailboxError};

/// Mock implementation of the Mailbox trait.
///
/// Messages behave like server mail: they stay unseen until flagged,
/// unless [`set_ignore_seen`](Self::set_ignore_seen) makes the server
/// forget flags.
#[derive(Debug)]
pub struct MockMailbox {
    messages: Arc<RwLock<Vec<MailMessage>>>,
    seen: Arc<RwLock<Vec<String>>>,
    ignore_seen: Arc<RwLock<bool>>,
    /// If set, the next fetch fails with this error.
    next_error: Arc<RwLock<Option<MailboxError>>>,
    fetch_senders: Arc<RwLock<Vec<String>>>,
    /// Simulated server latency of each fetch.
    fetch_delay: Arc<RwLock<Duration>>,
}

impl Default for MockMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMailbox {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
            seen: Arc::new(RwLock::new(Vec::new())),
            ignore_seen: Arc::new(RwLock::new(false)),
            next_error: Arc::new(RwLock::new(None)),
            fetch_senders: Arc::new(RwLock::new(Vec::new())),
            fetch_delay: Arc::new(RwLock::new(Duration::ZERO)),
        }
    }

    /// Deliver a raw message.
    pub async fn add_message(&self, uid: &str, raw: Vec<u8>) {
        self.messages.write().await.push(MailMessage {
            uid: uid.to_string(),
            raw,
        });
    }

    /// Keep returning flagged messages as unseen.
    pub async fn set_ignore_seen(&self, ignore: bool) {
        *self.ignore_seen.write().await = ignore;
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: MailboxError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every fetch take `delay` before answering.
    pub async fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.write().await = delay;
    }

    /// Uids flagged as seen, in order.
    pub async fn seen_uids(&self) -> Vec<String> {
        self.seen.read().await.clone()
    }

    /// Sender filter of every fetch.
    pub async fn fetch_senders(&self) -> Vec<String> {
        self.fetch_senders.read().await.clone()
    }
}

#[async_trait]
impl Mailbox for MockMailbox {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_unseen_from(&self, sender: &str) -> Result<Vec<MailMessage>, MailboxError> {
        self.fetch_senders.write().await.push(sender.to_string());
        let delay = *self.fetch_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let ignore_seen = *self.ignore_seen.read().await;
        let seen: HashSet<String> = self.seen.read().await.iter().cloned().collect();
        Ok(self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| ignore_seen || !seen.contains(&m.uid))
            .cloned()
            .collect())
    }

    async fn mark_seen(&self, uid: &str) -> Result<(), MailboxError> {
        let mut seen = self.seen.write().await;
        if !seen.iter().any(|s| s == uid) {
            seen.push(uid.to_string());
        }
        Ok(())
    }
}
