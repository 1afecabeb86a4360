use super::executor::{QueryExecutor, RowMaterializer, SqliteExecutor, SqliteItemMaterializer};
use super::query::{self, Predicate, ScopedQuery, Statement};
use super::schema::Database;
use super::status::StatusFlags;
use super::types::{Item, ItemError};

type Result<T> = std::result::Result<T, ItemError>;

/// Item lookups, listings and bulk mutations.
///
/// Every user-facing operation goes through [`ScopedQuery`], which joins the
/// item to its feed and filters on the feed owner. The two retention
/// operations are the exception: they run across all users.
///
/// Listings take a `status` mask and return only items with every bit of the
/// mask set. An empty mask matches every item.
#[derive(Clone)]
pub struct ItemRepository<E, M> {
    executor: E,
    materializer: M,
}

impl ItemRepository<SqliteExecutor, SqliteItemMaterializer> {
    /// Repository over an opened SQLite database
    pub fn sqlite(db: &Database) -> Self {
        Self::new(SqliteExecutor::new(db), SqliteItemMaterializer)
    }
}

impl<E, M> ItemRepository<E, M>
where
    E: QueryExecutor,
    M: RowMaterializer<E::Row>,
{
    pub fn new(executor: E, materializer: M) -> Self {
        Self {
            executor,
            materializer,
        }
    }

    async fn find_all_rows(&self, statement: &Statement) -> Result<Vec<Item>> {
        let rows = self.executor.fetch_rows(statement).await?;
        let items = rows
            .iter()
            .map(|row| self.materializer.materialize(row))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Exactly one row or an error. More than one row is never resolved by
    /// picking one.
    async fn find_one(&self, statement: &Statement) -> Result<Item> {
        let mut items = self.find_all_rows(statement).await?;
        match items.len() {
            0 => Err(ItemError::NotFound),
            1 => Ok(items.remove(0)),
            count => {
                tracing::warn!(count, sql = %statement.sql(), "Single-item lookup matched several rows");
                Err(ItemError::AmbiguousResult { count })
            }
        }
    }

    // ========================================================================
    // Single-Item Lookups
    // ========================================================================

    /// Get an item by id, visible only to the owner of its feed.
    ///
    /// # Errors
    ///
    /// `ItemError::NotFound` when the id does not exist or belongs to another
    /// user, `ItemError::AmbiguousResult` if several rows share the id.
    pub async fn find(&self, id: i64, user_id: &str) -> Result<Item> {
        tracing::debug!(item_id = id, user_id = %user_id, "find item");
        let statement = ScopedQuery::items(user_id)
            .and(Predicate::Item(id))
            .build();
        self.find_one(&statement).await
    }

    /// Get the item with `guid_hash` in one of the user's feeds.
    ///
    /// Ingestion uses this to detect duplicates before inserting.
    pub async fn find_by_guid_hash(
        &self,
        guid_hash: &str,
        feed_id: i64,
        user_id: &str,
    ) -> Result<Item> {
        tracing::debug!(feed_id, user_id = %user_id, "find item by guid hash");
        let statement = ScopedQuery::items(user_id)
            .and(Predicate::GuidHash(guid_hash.to_owned()))
            .and(Predicate::Feed(feed_id))
            .build();
        self.find_one(&statement).await
    }

    // ========================================================================
    // Counts
    // ========================================================================

    /// Number of the user's items with STARRED set.
    pub async fn starred_count(&self, user_id: &str) -> Result<i64> {
        let statement = ScopedQuery::count(user_id)
            .with_status(StatusFlags::STARRED)
            .build();
        let count = self.executor.fetch_scalar(&statement).await?;
        tracing::debug!(user_id = %user_id, count, "starred_count");
        Ok(count)
    }

    // ========================================================================
    // Paginated Listings
    // ========================================================================

    /// Newest-first page of the user's items matching `status`.
    ///
    /// `cursor` is an item id, not a row offset: when non-zero only items
    /// with a strictly greater id are returned. `limit == 0` is unbounded.
    async fn find_page(
        &self,
        scope: ScopedQuery,
        limit: u64,
        cursor: i64,
        status: StatusFlags,
    ) -> Result<Vec<Item>> {
        let mut query = scope.with_status(status);
        if cursor != 0 {
            query = query.and(Predicate::After(cursor));
        }
        let statement = query.newest_first().limit(limit).build();
        self.find_all_rows(&statement).await
    }

    /// Page through one feed, newest first.
    pub async fn find_all_feed(
        &self,
        feed_id: i64,
        limit: u64,
        cursor: i64,
        status: StatusFlags,
        user_id: &str,
    ) -> Result<Vec<Item>> {
        tracing::debug!(feed_id, limit, cursor, status = status.bits(), user_id = %user_id, "find_all_feed");
        let scope = ScopedQuery::items(user_id).and(Predicate::Feed(feed_id));
        self.find_page(scope, limit, cursor, status).await
    }

    /// Page through every feed filed in a folder, newest first.
    pub async fn find_all_folder(
        &self,
        folder_id: i64,
        limit: u64,
        cursor: i64,
        status: StatusFlags,
        user_id: &str,
    ) -> Result<Vec<Item>> {
        tracing::debug!(folder_id, limit, cursor, status = status.bits(), user_id = %user_id, "find_all_folder");
        let scope = ScopedQuery::items(user_id).and(Predicate::Folder(folder_id));
        self.find_page(scope, limit, cursor, status).await
    }

    /// Page through all of the user's items, newest first.
    pub async fn find_all(
        &self,
        limit: u64,
        cursor: i64,
        status: StatusFlags,
        user_id: &str,
    ) -> Result<Vec<Item>> {
        tracing::debug!(limit, cursor, status = status.bits(), user_id = %user_id, "find_all");
        self.find_page(ScopedQuery::items(user_id), limit, cursor, status)
            .await
    }

    // ========================================================================
    // Incremental Sync
    // ========================================================================

    /// Items with `id >= updated_since`. No ORDER BY and no limit: callers
    /// must not rely on row order.
    async fn find_since(
        &self,
        scope: ScopedQuery,
        updated_since: i64,
        status: StatusFlags,
    ) -> Result<Vec<Item>> {
        let statement = scope
            .with_status(status)
            .and(Predicate::Since(updated_since))
            .build();
        self.find_all_rows(&statement).await
    }

    pub async fn find_all_new_feed(
        &self,
        feed_id: i64,
        updated_since: i64,
        status: StatusFlags,
        user_id: &str,
    ) -> Result<Vec<Item>> {
        tracing::debug!(feed_id, updated_since, status = status.bits(), user_id = %user_id, "find_all_new_feed");
        let scope = ScopedQuery::items(user_id).and(Predicate::Feed(feed_id));
        self.find_since(scope, updated_since, status).await
    }

    pub async fn find_all_new_folder(
        &self,
        folder_id: i64,
        updated_since: i64,
        status: StatusFlags,
        user_id: &str,
    ) -> Result<Vec<Item>> {
        tracing::debug!(folder_id, updated_since, status = status.bits(), user_id = %user_id, "find_all_new_folder");
        let scope = ScopedQuery::items(user_id).and(Predicate::Folder(folder_id));
        self.find_since(scope, updated_since, status).await
    }

    pub async fn find_all_new(
        &self,
        updated_since: i64,
        status: StatusFlags,
        user_id: &str,
    ) -> Result<Vec<Item>> {
        tracing::debug!(updated_since, status = status.bits(), user_id = %user_id, "find_all_new");
        self.find_since(ScopedQuery::items(user_id), updated_since, status)
            .await
    }

    // ========================================================================
    // Bulk Mutations
    // ========================================================================

    /// Mark every item of a feed with `id <= highest_item_id` as read,
    /// returns the number of rows updated.
    ///
    /// Only UNREAD is cleared; STARRED survives. Items of feeds the user does
    /// not own are never touched.
    pub async fn read_feed(&self, feed_id: i64, highest_item_id: i64, user_id: &str) -> Result<u64> {
        let statement = query::mark_feed_read(user_id, feed_id, highest_item_id);
        let updated = self.executor.execute(&statement).await?;
        tracing::debug!(feed_id, highest_item_id, user_id = %user_id, updated, "read_feed");
        Ok(updated)
    }

    // ========================================================================
    // Retention
    // ========================================================================

    /// Up to `threshold` read, unstarred items across all users. Unordered.
    ///
    /// Not user-scoped: this backs a system-wide cleanup job.
    pub async fn get_read_older_than_threshold(&self, threshold: u64) -> Result<Vec<Item>> {
        let statement = query::select_read_unstarred(threshold);
        let items = self.find_all_rows(&statement).await?;
        tracing::info!(threshold, found = items.len(), "Collected read items for retention");
        Ok(items)
    }

    /// Delete read, unstarred items with `id < id` across all users, returns
    /// the number of rows deleted.
    ///
    /// Unread or starred items survive regardless of their id. Racing with
    /// ingest or `read_feed` is acceptable: only rows already read and
    /// unstarred when the statement runs are removed.
    pub async fn delete_read_older_than_id(&self, id: i64) -> Result<u64> {
        let statement = query::delete_read_unstarred_below(id);
        let deleted = self.executor.execute(&statement).await?;
        tracing::info!(below_id = id, deleted, "Deleted read items");
        Ok(deleted)
    }
}
