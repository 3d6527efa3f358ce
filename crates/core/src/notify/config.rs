//! Configuration for operator notifications.

use serde::{Deserialize, Serialize};

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Prepended to every subject, e.g. `[EHCPA]`.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    #[serde(default)]
    pub probe: ProbeConfig,

    /// Outbound mail. Without it notifications are only logged.
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

fn default_subject_prefix() -> String {
    "[EHCPA]".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            subject_prefix: default_subject_prefix(),
            probe: ProbeConfig::default(),
            smtp: None,
        }
    }
}

/// Well-known endpoint used to decide whether the network is up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_host")]
    pub host: String,

    #[serde(default = "default_probe_port")]
    pub port: u16,

    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_probe_host() -> String {
    "8.8.8.8".to_string()
}

fn default_probe_port() -> u16 {
    53
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: default_probe_host(),
            port: default_probe_port(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// SMTP relay credentials and recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,

    /// Implicit TLS port by default.
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Sender address; defaults to the username.
    #[serde(default)]
    pub from: Option<String>,

    pub to: Vec<String>,

    /// Use STARTTLS instead of implicit TLS.
    #[serde(default)]
    pub starttls: bool,

    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    465
}

fn default_smtp_timeout_secs() -> u64 {
    30
}
