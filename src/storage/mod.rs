mod executor;
mod items;
pub mod query;
mod schema;
mod status;
mod types;

pub use executor::{QueryExecutor, RowMaterializer, SqliteExecutor, SqliteItemMaterializer};
pub use items::ItemRepository;
pub use query::{Param, Predicate, ScopedQuery, Statement};
pub use schema::Database;
pub use status::StatusFlags;
pub use types::{DatabaseError, Item, ItemError};
