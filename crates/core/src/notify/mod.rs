//! Operator notifications gated on network connectivity.

mod config;
mod error;
mod probe;
mod service;
mod smtp;
mod traits;

pub use config::{NotifyConfig, ProbeConfig, SmtpConfig};
pub use error::NotifyError;
pub use probe::TcpProbe;
pub use service::NotificationService;
pub use smtp::SmtpNotifier;
pub use traits::{ConnectivityProbe, Notifier};
