//! Persistence (spec §4.10): pending memory cards and pending
//! session-summary cards awaiting staff confirm/deny.

pub mod sqlite;

pub use sqlite::{PendingSessionSummary, SqliteStore};
