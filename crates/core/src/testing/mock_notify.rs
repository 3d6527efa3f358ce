//! Mock connectivity probe and notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::{ConnectivityProbe, Notifier, NotifyError};

/// Probe with a switchable answer.
#[derive(Debug)]
pub struct MockProbe {
    reachable: Arc<RwLock<bool>>,
    calls: Arc<RwLock<usize>>,
}

impl MockProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: Arc::new(RwLock::new(reachable)),
            calls: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn set_reachable(&self, reachable: bool) {
        *self.reachable.write().await = reachable;
    }

    /// Number of probes made.
    pub async fn calls(&self) -> usize {
        *self.calls.read().await
    }
}

#[async_trait]
impl ConnectivityProbe for MockProbe {
    async fn probe(&self) -> bool {
        *self.calls.write().await += 1;
        *self.reachable.read().await
    }
}

/// A notification accepted by [`MockNotifier`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub subject: String,
    pub body: String,
}

/// Notifier that records what it sends.
#[derive(Debug)]
pub struct MockNotifier {
    sent: Arc<RwLock<Vec<SentNotification>>>,
    /// If set, the next send fails with this error.
    next_error: Arc<RwLock<Option<NotifyError>>>,
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }

    pub async fn set_next_error(&self, error: NotifyError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        self.sent.write().await.push(SentNotification {
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
