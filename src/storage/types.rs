use sha2::{Digest, Sha256};
use thiserror::Error;

use super::status::StatusFlags;
use crate::config::ConfigError;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another connection holds a lock on the database file
    #[error("The item database is locked by another connection")]
    InstanceLocked,

    /// Schema bootstrap failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Store configuration was rejected before connecting
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6) surface through the message text.
/// SQLITE_CANTOPEN is a path or permission problem and stays `Other`.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
}

/// Errors from item lookups and mutations.
///
/// `NotFound` and `AmbiguousResult` are only produced by the single-item
/// lookups. Everything the executor reports is passed through untouched as
/// `StorageFailure`.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Item not found")]
    NotFound,

    /// More than one row matched a lookup that must be unique
    #[error("Expected a single item but {count} rows matched")]
    AmbiguousResult { count: usize },

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] sqlx::Error),
}

impl ItemError {
    /// True for the error an application layer should answer with a 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, ItemError::NotFound)
    }
}

// ============================================================================
// Helper Types
// ============================================================================

/// Internal row type for item queries (used by sqlx FromRow)
/// Converts to Item via into_item() so the status column is decoded once
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ItemDbRow {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub guid_hash: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub body: Option<String>,
    pub pub_date: Option<i64>,
    pub last_modified: i64,
    pub status: i64,
}

impl ItemDbRow {
    pub(crate) fn into_item(self) -> Item {
        Item {
            id: self.id,
            feed_id: self.feed_id,
            guid: self.guid,
            guid_hash: self.guid_hash,
            url: self.url,
            title: self.title,
            author: self.author,
            body: self.body,
            pub_date: self.pub_date,
            last_modified: self.last_modified,
            status: StatusFlags::from_column(self.status),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A stored article.
///
/// `id` is assigned by storage and only ever grows, which is what lets it act
/// as the pagination cursor and the incremental-sync watermark.
/// `guid_hash` identifies the item within its feed and is what ingestion
/// checks before inserting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub guid_hash: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub body: Option<String>,
    pub pub_date: Option<i64>,
    pub last_modified: i64,
    pub status: StatusFlags,
}

impl Item {
    /// Hex SHA-256 of a feed entry's guid, the value stored in `guid_hash`.
    pub fn hash_guid(guid: &str) -> String {
        format!("{:x}", Sha256::digest(guid.trim().as_bytes()))
    }

    pub fn is_unread(&self) -> bool {
        self.status.is_unread()
    }

    pub fn is_starred(&self) -> bool {
        self.status.is_starred()
    }
}
