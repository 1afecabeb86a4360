use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;

use super::types::{is_lock_message, DatabaseError};
use crate::config::StoreConfig;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database with default settings and bootstrap the schema
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another connection holds the
    /// database lock (SQLITE_BUSY, SQLITE_LOCKED).
    /// Returns `DatabaseError::Other` for other database errors, including a
    /// file that cannot be opened.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        Self::open_with_config(&StoreConfig::for_path(path)).await
    }

    /// Open a database using pool and timeout settings from `config`
    pub async fn open_with_config(config: &StoreConfig) -> Result<Self, DatabaseError> {
        config.validate()?;
        let path = config.database_path.as_str();
        let url = format!("sqlite:{}?mode=rwc", path);

        // Pre-create the file owner-only so it never exists with umask permissions
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() && db_path.parent().is_some_and(|p| p.exists()) {
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok(); // If creation fails, SQLite will report the error at connect_with.
            }
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            let message = e.to_string();
            if is_lock_message(&message) {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(message)
            }
        })?;
        tracing::debug!(path = %path, max_connections = config.max_connections, "Item store opened");
        Ok(db)
    }

    /// Underlying pool, for ingestion code that writes items outside this crate.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet.
    ///
    /// All statements run in one transaction and are idempotent, so running
    /// this against an existing database is a no-op. There is no versioning.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS folders (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                UNIQUE(user_id, name)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                folder_id INTEGER REFERENCES folders(id) ON DELETE SET NULL,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                UNIQUE(user_id, url)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // AUTOINCREMENT: ids are never reused, so they stay usable as cursors
        // and as the retention bound even after deletes.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                guid TEXT NOT NULL,
                guid_hash TEXT NOT NULL,
                url TEXT,
                title TEXT,
                author TEXT,
                body TEXT,
                pub_date INTEGER,
                last_modified INTEGER NOT NULL DEFAULT 0,
                status INTEGER NOT NULL DEFAULT 2,
                UNIQUE(feed_id, guid_hash)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Owner scoping: every user query joins through feeds.user_id
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feeds_user ON feeds(user_id, folder_id)")
            .execute(&mut *tx)
            .await?;

        // Feed listings and read_feed filter on feed_id and walk id
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_feed_id ON items(feed_id, id DESC)")
            .execute(&mut *tx)
            .await?;

        // Retention scans on status then bounds by id
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_status_id ON items(status, id)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[tokio::test]
    async fn test_open_in_memory_creates_tables() {
        let db = Database::open(":memory:").await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('folders', 'feeds', 'items') ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        let names: Vec<_> = tables.into_iter().map(|(n,)| n).collect();
        assert_eq!(names, vec!["feeds", "folders", "items"]);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_connecting() {
        let config = StoreConfig {
            max_connections: 0,
            ..StoreConfig::for_path(":memory:")
        };
        let err = Database::open_with_config(&config).await.err().unwrap();
        assert!(matches!(err, DatabaseError::Config(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_unopenable_path_is_not_reported_as_locked() {
        let config = StoreConfig {
            acquire_timeout_secs: 1,
            ..StoreConfig::for_path("/nonexistent-feedstore-dir/sub/items.db")
        };
        let err = Database::open_with_config(&config).await.err().unwrap();
        assert!(matches!(err, DatabaseError::Other(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_new_items_default_to_unread() {
        let db = Database::open(":memory:").await.unwrap();
        sqlx::query("INSERT INTO feeds (id, user_id, url, title) VALUES (1, 'alice', 'u', 't')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO items (feed_id, guid, guid_hash) VALUES (1, 'g', 'h')")
            .execute(db.pool())
            .await
            .unwrap();
        let (status,): (i64,) = sqlx::query_as("SELECT status FROM items")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(status, crate::storage::StatusFlags::UNREAD.to_column());
    }
}
