use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::command::MailboxConfig;
use crate::notify::{NotifyConfig, ProbeConfig};
use crate::orchestrator::OrchestratorConfig;
use crate::products::ProductsConfig;
use crate::publish::PublishConfig;
use crate::stages::StagesConfig;
use crate::subset::SubsetConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub subset: SubsetConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Command mailbox; remote requests are disabled without it.
    #[serde(default)]
    pub mailbox: Option<MailboxConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub stages: StagesConfig,
    #[serde(default)]
    pub products: ProductsConfig,
    /// Map server; the publish stage is skipped without it.
    #[serde(default)]
    pub publish: Option<PublishConfig>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("droughtwatch.db")
}

/// Working directories shared by the download and the stages.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Daily files as downloaded; purged on the reset day.
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    /// Monthly totals.
    #[serde(default = "default_monthly_dir")]
    pub monthly_dir: PathBuf,
    /// Concatenated stacks fed to the index computation.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    /// Cropped rasters.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Files served by the download endpoint.
    #[serde(default = "default_downloadable_dir")]
    pub downloadable_dir: PathBuf,
}

impl PathsConfig {
    /// Default layout below `root`.
    pub fn under(root: &Path) -> Self {
        Self {
            raw_dir: root.join("raw"),
            monthly_dir: root.join("monthly"),
            input_dir: root.join("input"),
            output_dir: root.join("output"),
            downloadable_dir: root.join("output").join("downloadable"),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            monthly_dir: default_monthly_dir(),
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            downloadable_dir: default_downloadable_dir(),
        }
    }
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_monthly_dir() -> PathBuf {
    PathBuf::from("data/monthly")
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("data/input")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/output")
}

fn default_downloadable_dir() -> PathBuf {
    PathBuf::from("data/output/downloadable")
}

/// Calibration cycle settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalendarConfig {
    /// Day of month on which a new calibration cycle starts.
    #[serde(default = "default_reset_day")]
    pub reset_day: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            reset_day: default_reset_day(),
        }
    }
}

fn default_reset_day() -> u32 {
    crate::calendar::DEFAULT_RESET_DAY
}

/// When the scheduled run and the mailbox poll fire.
///
/// Cron expressions use the seconds-first, six field form and are evaluated
/// in local time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub daily_enabled: bool,

    #[serde(default = "default_daily_cron")]
    pub daily_cron: String,

    #[serde(default = "default_true")]
    pub mailbox_enabled: bool,

    #[serde(default = "default_mailbox_cron")]
    pub mailbox_cron: String,

    /// A tick noticed later than this is skipped rather than run late.
    #[serde(default = "default_misfire_grace")]
    pub misfire_grace_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_enabled: true,
            daily_cron: default_daily_cron(),
            mailbox_enabled: true,
            mailbox_cron: default_mailbox_cron(),
            misfire_grace_secs: default_misfire_grace(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_daily_cron() -> String {
    "0 0 3 * * *".to_string()
}

fn default_mailbox_cron() -> String {
    "0 0,30 0-2,20-23 * * *".to_string()
}

fn default_misfire_grace() -> u64 {
    3600
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub paths: PathsConfig,
    pub subset: SubsetConfig,
    pub calendar: CalendarConfig,
    pub schedule: ScheduleConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mailbox: Option<SanitizedMailboxConfig>,
    pub notify: SanitizedNotifyConfig,
    pub stages: StagesConfig,
    pub products: ProductsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<SanitizedPublishConfig>,
    pub orchestrator: OrchestratorConfig,
}

/// Sanitized mailbox config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMailboxConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password_configured: bool,
    pub folder: String,
    pub trusted_sender: String,
    pub command_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifyConfig {
    pub subject_prefix: String,
    pub probe: ProbeConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SanitizedSmtpConfig>,
}

/// Sanitized SMTP config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password_configured: bool,
    pub to: Vec<String>,
    pub starttls: bool,
}

/// Sanitized map server config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPublishConfig {
    pub url: String,
    pub username: String,
    pub password_configured: bool,
    pub workspace: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            paths: config.paths.clone(),
            subset: config.subset.clone(),
            calendar: config.calendar.clone(),
            schedule: config.schedule.clone(),
            mailbox: config.mailbox.as_ref().map(|m| SanitizedMailboxConfig {
                host: m.host.clone(),
                port: m.port,
                username: m.username.clone(),
                password_configured: !m.password.is_empty(),
                folder: m.folder.clone(),
                trusted_sender: m.trusted_sender.clone(),
                command_token: m.command_token.clone(),
            }),
            notify: SanitizedNotifyConfig {
                subject_prefix: config.notify.subject_prefix.clone(),
                probe: config.notify.probe.clone(),
                smtp: config.notify.smtp.as_ref().map(|s| SanitizedSmtpConfig {
                    host: s.host.clone(),
                    port: s.port,
                    username: s.username.clone(),
                    password_configured: !s.password.is_empty(),
                    to: s.to.clone(),
                    starttls: s.starttls,
                }),
            },
            stages: config.stages.clone(),
            products: config.products.clone(),
            publish: config.publish.as_ref().map(|p| SanitizedPublishConfig {
                url: p.url.clone(),
                username: p.username.clone(),
                password_configured: !p.password.is_empty(),
                workspace: p.workspace.clone(),
            }),
            orchestrator: config.orchestrator.clone(),
        }
    }
}
