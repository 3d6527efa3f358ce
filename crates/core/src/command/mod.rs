//! Inbound command channel.
//!
//! Operators request on-demand runs by mail: a message from the trusted
//! sender whose subject carries the command token, with the requested
//! range in the body:
//!
//! ```text
//! Fecha de inicio: 2024-05-01
//! Fecha de fin: 2024-05-10
//! ```

mod channel;
mod config;
mod error;
mod imap;
mod parse;
mod traits;
mod types;

pub use channel::CommandChannel;
pub use config::MailboxConfig;
pub use error::MailboxError;
pub use imap::ImapMailbox;
pub use parse::{extract_date, extract_range, parse_message, subject_matches, ParsedMessage};
pub use traits::Mailbox;
pub use types::{MailMessage, RemoteRequest};
