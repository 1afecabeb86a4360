//! Collaborators injected into [`ItemRepository`](super::ItemRepository).
//!
//! The repository never talks to a driver directly. It hands a finished
//! [`Statement`] to a [`QueryExecutor`] and turns returned rows into items
//! with a [`RowMaterializer`]. The SQLite pair below is what production uses;
//! tests substitute in-memory fakes.

use std::future::Future;

use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Row, Sqlite, SqlitePool};

use super::query::{Param, Statement};
use super::schema::Database;
use super::types::{Item, ItemDbRow};

/// Runs parameterized statements, binding `Statement::params` positionally.
pub trait QueryExecutor: Send + Sync {
    type Row: Send;

    /// Run a SELECT and return every row.
    fn fetch_rows(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = Result<Vec<Self::Row>, sqlx::Error>> + Send;

    /// Run a single-row, single-column SELECT such as `COUNT(*)`.
    fn fetch_scalar(
        &self,
        statement: &Statement,
    ) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;

    /// Run an UPDATE or DELETE and return the affected row count.
    fn execute(&self, statement: &Statement)
        -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

/// Turns one executor row into an [`Item`].
pub trait RowMaterializer<R>: Send + Sync {
    fn materialize(&self, row: &R) -> Result<Item, sqlx::Error>;
}

// ============================================================================
// SQLite
// ============================================================================

#[derive(Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool.clone(),
        }
    }
}

fn bind_all(statement: &Statement) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    statement
        .params()
        .iter()
        .fold(sqlx::query(statement.sql()), |query, param| match param {
            Param::Int(value) => query.bind(*value),
            Param::Text(value) => query.bind(value.as_str()),
        })
}

impl QueryExecutor for SqliteExecutor {
    type Row = SqliteRow;

    async fn fetch_rows(&self, statement: &Statement) -> Result<Vec<SqliteRow>, sqlx::Error> {
        bind_all(statement).fetch_all(&self.pool).await
    }

    async fn fetch_scalar(&self, statement: &Statement) -> Result<i64, sqlx::Error> {
        let row = bind_all(statement).fetch_one(&self.pool).await?;
        row.try_get(0)
    }

    async fn execute(&self, statement: &Statement) -> Result<u64, sqlx::Error> {
        let result = bind_all(statement).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// Decodes `items.*` rows by column name.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteItemMaterializer;

impl RowMaterializer<SqliteRow> for SqliteItemMaterializer {
    fn materialize(&self, row: &SqliteRow) -> Result<Item, sqlx::Error> {
        ItemDbRow::from_row(row).map(ItemDbRow::into_item)
    }
}
