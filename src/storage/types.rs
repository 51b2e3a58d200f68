use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds a lock on the database file
    #[error("Database is locked by another process. Is another newspush instance running?")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::Locked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6) surface only through their messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
}

// ============================================================================
// Data Structures
// ============================================================================

/// Durable record that an entry of a source has been notified.
///
/// At most one record exists per `(source_url, feed_url)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCheckRecord {
    pub source_url: String,
    /// Link of the feed entry.
    pub feed_url: String,
    pub last_checked: DateTime<Utc>,
}

impl FeedCheckRecord {
    pub fn new(source_url: impl Into<String>, feed_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            feed_url: feed_url.into(),
            last_checked: Utc::now(),
        }
    }
}

/// Internal row type for feed_checks queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedCheckRow {
    pub source_url: String,
    pub feed_url: String,
    /// Milliseconds since the Unix epoch
    pub last_checked: i64,
}

impl FeedCheckRow {
    pub(crate) fn into_record(self) -> FeedCheckRecord {
        FeedCheckRecord {
            source_url: self.source_url,
            feed_url: self.feed_url,
            last_checked: DateTime::from_timestamp_millis(self.last_checked).unwrap_or_default(),
        }
    }
}
