//! Mailbox poller yielding operator requests.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::history::ProcessedMessages;
use crate::metrics;

use super::config::MailboxConfig;
use super::error::MailboxError;
use super::parse::{extract_range, parse_message, subject_matches};
use super::traits::Mailbox;
use super::types::{MailMessage, RemoteRequest};

/// Polls the mailbox for trusted, subject-tagged date-range requests.
///
/// Every message is considered at most once per instance; messages that
/// were accepted or rejected as malformed are also recorded in the
/// optional durable ledger and flagged `\Seen` on the server.
pub struct CommandChannel {
    mailbox: Arc<dyn Mailbox>,
    config: MailboxConfig,
    ledger: Option<Arc<dyn ProcessedMessages>>,
    seen: Mutex<HashSet<String>>,
}

impl CommandChannel {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        config: MailboxConfig,
        ledger: Option<Arc<dyn ProcessedMessages>>,
    ) -> Self {
        Self {
            mailbox,
            config,
            ledger,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Returns at most one new request per call.
    pub async fn poll(&self) -> Result<Option<RemoteRequest>, MailboxError> {
        let sender = &self.config.trusted_sender;
        let messages = self.mailbox.fetch_unseen_from(sender).await?;
        if messages.is_empty() {
            debug!(sender = %sender, "No unseen messages from trusted sender");
            return Ok(None);
        }

        for message in messages {
            let parsed = match parse_message(&message.raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    if self.already_processed(&message.uid).await? {
                        continue;
                    }
                    warn!(uid = %message.uid, error = %e, "Discarding unparseable message");
                    self.discard(&message, &message.uid).await?;
                    continue;
                }
            };

            let id = parsed
                .message_id
                .clone()
                .unwrap_or_else(|| message.uid.clone());
            if self.already_processed(&id).await? {
                debug!(message_id = %id, "Skipping already processed message");
                continue;
            }

            if !subject_matches(&parsed.subject, &self.config.command_token) {
                debug!(message_id = %id, subject = %parsed.subject, "Subject does not carry the command token");
                self.seen.lock().await.insert(id);
                continue;
            }

            let range = parsed.body.as_deref().and_then(|body| {
                extract_range(body, &self.config.begin_label, &self.config.end_label)
            });
            let Some(range) = range else {
                warn!(message_id = %id, "Request is missing a valid date range; discarding");
                self.discard(&message, &id).await?;
                continue;
            };

            self.remember(&id, Some(range.begin), Some(range.end)).await?;
            self.flag_seen(&message).await;
            metrics::MAILBOX_REQUESTS.inc();
            info!(message_id = %id, %range, "Accepted operator request");

            return Ok(Some(RemoteRequest {
                sender: sender.clone(),
                subject_matched: true,
                range,
                message_id: id,
            }));
        }

        Ok(None)
    }

    async fn already_processed(&self, id: &str) -> Result<bool, MailboxError> {
        if self.seen.lock().await.contains(id) {
            return Ok(true);
        }
        match &self.ledger {
            Some(ledger) => ledger
                .is_processed(id)
                .map_err(|e| MailboxError::Store(e.to_string())),
            None => Ok(false),
        }
    }

    async fn remember(
        &self,
        id: &str,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(), MailboxError> {
        self.seen.lock().await.insert(id.to_string());
        if let Some(ledger) = &self.ledger {
            ledger
                .mark_processed(id, begin, end)
                .map_err(|e| MailboxError::Store(e.to_string()))?;
        }
        Ok(())
    }

    async fn discard(&self, message: &MailMessage, id: &str) -> Result<(), MailboxError> {
        self.remember(id, None, None).await?;
        self.flag_seen(message).await;
        Ok(())
    }

    async fn flag_seen(&self, message: &MailMessage) {
        if let Err(e) = self.mailbox.mark_seen(&message.uid).await {
            warn!(uid = %message.uid, error = %e, "Could not flag message as seen");
        }
    }
}
