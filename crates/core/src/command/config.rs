//! Configuration for the inbound command mailbox.

use serde::{Deserialize, Serialize};

/// IMAP account polled for operator requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_folder")]
    pub folder: String,

    /// Only messages from this address are considered.
    pub trusted_sender: String,

    /// Subject token marking a download request, matched case-insensitively.
    #[serde(default = "default_command_token")]
    pub command_token: String,

    /// Body label preceding the first requested day.
    #[serde(default = "default_begin_label")]
    pub begin_label: String,

    /// Body label preceding the last requested day.
    #[serde(default = "default_end_label")]
    pub end_label: String,
}

fn default_host() -> String {
    "imap.gmail.com".to_string()
}

fn default_port() -> u16 {
    993
}

fn default_folder() -> String {
    "INBOX".to_string()
}

fn default_command_token() -> String {
    "DESCARGAR".to_string()
}

fn default_begin_label() -> String {
    "Fecha de inicio".to_string()
}

fn default_end_label() -> String {
    "Fecha de fin".to_string()
}

impl MailboxConfig {
    /// Config with default server settings and labels.
    pub fn new(username: impl Into<String>, trusted_sender: impl Into<String>) -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: username.into(),
            password: String::new(),
            folder: default_folder(),
            trusted_sender: trusted_sender.into(),
            command_token: default_command_token(),
            begin_label: default_begin_label(),
            end_label: default_end_label(),
        }
    }
}
