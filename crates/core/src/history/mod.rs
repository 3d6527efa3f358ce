//! Persistent run history and processed-message ledger.

mod sqlite;
mod traits;

pub use sqlite::SqliteHistoryStore;
pub use traits::{ProcessedMessages, RunHistory, StoreError};
