//! Send-if-reachable notification service.

use std::sync::Arc;
use tracing::{info, warn};

use crate::metrics;

use super::traits::{ConnectivityProbe, Notifier};

/// Gates every outbound notification on a connectivity probe.
///
/// [`notify`](Self::notify) never fails: an unreachable network or a
/// delivery error degrades to a log line and a `false` return.
pub struct NotificationService {
    probe: Arc<dyn ConnectivityProbe>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl NotificationService {
    pub fn new(probe: Arc<dyn ConnectivityProbe>, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { probe, notifier }
    }

    pub fn has_notifier(&self) -> bool {
        self.notifier.is_some()
    }

    /// Whether the network is currently reachable.
    pub async fn probe(&self) -> bool {
        self.probe.probe().await
    }

    /// Sends a notification if the network is reachable. Returns whether it
    /// was delivered.
    pub async fn notify(&self, subject: &str, body: &str) -> bool {
        let Some(notifier) = &self.notifier else {
            info!(subject, "No notifier configured; notification logged only");
            metrics::NOTIFICATIONS.with_label_values(&["disabled"]).inc();
            return false;
        };

        if !self.probe.probe().await {
            warn!(subject, "No connectivity; notification not sent");
            metrics::NOTIFICATIONS.with_label_values(&["unreachable"]).inc();
            return false;
        }

        match notifier.send(subject, body).await {
            Ok(()) => {
                info!(subject, notifier = notifier.name(), "Notification sent");
                metrics::NOTIFICATIONS.with_label_values(&["sent"]).inc();
                true
            }
            Err(e) => {
                warn!(subject, error = %e, "Notification could not be delivered");
                metrics::NOTIFICATIONS.with_label_values(&["failed"]).inc();
                false
            }
        }
    }
}
