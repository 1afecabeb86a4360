//! Item storage for a multi-user feed reader.
//!
//! Items (articles) belong to feeds, feeds belong to a user and optionally to
//! a folder. Every user-facing query in this crate joins items to their feed
//! and filters on the feed owner, so an item is never reachable by id alone.
//!
//! - [`storage::ItemRepository`] - scoped lookups, paginated listings,
//!   incremental sync, bulk mark-read and retention cleanup
//! - [`storage::ScopedQuery`] - typed predicate builder producing SQL text
//!   together with its positional parameters
//! - [`config::StoreConfig`] - optional TOML configuration for the SQLite pool
//!
//! # Example
//!
//! ```ignore
//! use feedstore::storage::{Database, ItemRepository, StatusFlags};
//!
//! let db = Database::open("news.db").await?;
//! let items = ItemRepository::sqlite(&db);
//!
//! // First page of unread items for alice, newest first
//! let page = items.find_all(20, 0, StatusFlags::UNREAD, "alice").await?;
//! ```

pub mod config;
pub mod storage;
