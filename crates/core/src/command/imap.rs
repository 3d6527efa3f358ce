//! IMAP mailbox over implicit TLS.
//!
//! The `imap` client is blocking, so each operation opens a short session on
//! the blocking thread pool.

use async_trait::async_trait;
use std::net::TcpStream;
use tracing::debug;

use super::config::MailboxConfig;
use super::error::MailboxError;
use super::traits::Mailbox;
use super::types::MailMessage;

type Session = imap::Session<native_tls::TlsStream<TcpStream>>;

/// Connection settings copied into each blocking task.
#[derive(Debug, Clone)]
struct ImapSettings {
    host: String,
    port: u16,
    username: String,
    password: String,
    folder: String,
}

/// Mailbox reached over IMAPS.
pub struct ImapMailbox {
    settings: ImapSettings,
}

impl ImapMailbox {
    pub fn new(config: &MailboxConfig) -> Self {
        Self {
            settings: ImapSettings {
                host: config.host.clone(),
                port: config.port,
                username: config.username.clone(),
                password: config.password.clone(),
                folder: config.folder.clone(),
            },
        }
    }

    async fn with_session<T, F>(&self, op: F) -> Result<T, MailboxError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> Result<T, MailboxError> + Send + 'static,
    {
        let settings = self.settings.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = open_session(&settings)?;
            session.select(&settings.folder)?;
            let result = op(&mut session);
            if let Err(e) = session.logout() {
                debug!(error = %e, "IMAP logout failed");
            }
            result
        })
        .await
        .map_err(|e| MailboxError::Task(e.to_string()))?
    }
}

fn open_session(settings: &ImapSettings) -> Result<Session, MailboxError> {
    let tls = native_tls::TlsConnector::builder()
        .build()
        .map_err(|e| MailboxError::Connection(e.to_string()))?;
    let client = imap::connect(
        (settings.host.as_str(), settings.port),
        settings.host.as_str(),
        &tls,
    )?;
    client
        .login(&settings.username, &settings.password)
        .map_err(|(e, _)| MailboxError::Authentication(e.to_string()))
}

/// IMAP search for unseen mail from one sender.
fn unseen_query(sender: &str) -> String {
    let escaped = sender.replace('\\', "\\\\").replace('"', "\\\"");
    format!("UNSEEN FROM \"{}\"", escaped)
}

#[async_trait]
impl Mailbox for ImapMailbox {
    fn name(&self) -> &str {
        "imap"
    }

    async fn fetch_unseen_from(&self, sender: &str) -> Result<Vec<MailMessage>, MailboxError> {
        let query = unseen_query(sender);
        self.with_session(move |session| {
            let mut uids: Vec<u32> = session.uid_search(&query)?.into_iter().collect();
            uids.sort_unstable();

            let mut messages = Vec::with_capacity(uids.len());
            for uid in uids {
                // PEEK leaves the \Seen flag untouched until a request is accepted.
                let fetches = session.uid_fetch(uid.to_string(), "BODY.PEEK[]")?;
                for fetch in fetches.iter() {
                    if let Some(body) = fetch.body() {
                        messages.push(MailMessage {
                            uid: uid.to_string(),
                            raw: body.to_vec(),
                        });
                    }
                }
            }
            debug!(count = messages.len(), "Fetched unseen messages");
            Ok(messages)
        })
        .await
    }

    async fn mark_seen(&self, uid: &str) -> Result<(), MailboxError> {
        let uid = uid.to_string();
        self.with_session(move |session| {
            session.uid_store(&uid, "+FLAGS (\\Seen)")?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_query() {
        assert_eq!(
            unseen_query("operator@example.org"),
            "UNSEEN FROM \"operator@example.org\""
        );
        assert_eq!(unseen_query("a\"b"), "UNSEEN FROM \"a\\\"b\"");
    }
}
