use sqlx::{Row, SqlitePool};
use std::fmt::Display;

/// A table keyed by a unique `url` column.
#[async_trait::async_trait]
pub trait Table {
    type Record<'a>;

    fn get_name(&self) -> &str;
    fn get_pool(&self) -> &SqlitePool;

    async fn create(&self) -> Result<(), sqlx::Error>;

    /// Insert, or replace every column of the existing row with the same url.
    async fn upsert<'a>(&self, record: Self::Record<'a>) -> Result<(), sqlx::Error>;

    async fn is_exist<I: AsRef<str> + Display + Send + Sync>(
        &self,
        url: I,
    ) -> Result<bool, sqlx::Error> {
        let query = format!("SELECT url FROM {} WHERE url = ?", self.get_name());
        Ok(sqlx::query(&query)
            .bind(url.as_ref())
            .fetch_optional(self.get_pool())
            .await?
            .is_some())
    }

    async fn count(&self) -> Result<u32, sqlx::Error> {
        let query = format!("SELECT COUNT(*) FROM {}", self.get_name());
        Ok(sqlx::query(&query)
            .fetch_one(self.get_pool())
            .await?
            .try_get(0)?)
    }
}

/// Constraint violations other than the one `upsert` resolves.
/// SQLite extended codes: 2067 = UNIQUE, 1555 = PRIMARY KEY.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("2067") | Some("1555")),
        _ => false,
    }
}
