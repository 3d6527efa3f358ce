pub mod archive;
pub mod calendar;
pub mod command;
pub mod config;
pub mod history;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod products;
pub mod publish;
pub mod stages;
pub mod staging;
pub mod subset;
pub mod testing;

pub use calendar::{CalendarError, CalibrationCalendar, CalibrationWindow};
pub use command::{CommandChannel, ImapMailbox, Mailbox, MailboxConfig, MailboxError, RemoteRequest};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, PathsConfig,
    SanitizedConfig, CONFIG_PATH_ENV,
};
pub use history::{ProcessedMessages, RunHistory, SqliteHistoryStore, StoreError};
pub use notify::{ConnectivityProbe, NotificationService, Notifier, SmtpNotifier, TcpProbe};
pub use orchestrator::{
    DateRange, ErrorKind, OrchestratorConfig, OrchestratorError, PipelineOrchestrator,
    PipelinePhase, PipelineRun, RunMode, RunOutcome, RunPermit,
};
pub use products::{ProductCatalog, ProductError, ProductId};
pub use publish::{GeoServerPublisher, RasterPublisher};
pub use stages::{command_stages, Stage, StageKind};
pub use staging::StagingArea;
pub use subset::{HttpSubsetService, SubsetJobClient, SubsetService};
