//! Trait definitions for the notify module.

use async_trait::async_trait;

use super::error::NotifyError;

/// Cheap check that the network is reachable.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> bool;
}

/// Delivers a plain-text message to the operators.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}
