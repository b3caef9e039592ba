use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use std::str::FromStr;
use tokio::time::Duration;
use tracing::{info, instrument};

use crate::error::{ClusterError, Result};
use crate::TARGET_DB;

#[derive(Clone, Debug)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Get access to the database pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

// Helper method to check if an sqlx error is a database lock error
pub trait DbLockErrorExt {
    fn is_database_lock_error(&self) -> bool;
}

impl DbLockErrorExt for sqlx::Error {
    fn is_database_lock_error(&self) -> bool {
        match self {
            // SQLITE_BUSY, SQLITE_LOCKED and their extended codes
            sqlx::Error::Database(err) => matches!(
                err.code().as_deref(),
                Some("5") | Some("6") | Some("261") | Some("262") | Some("517")
            ),
            _ => false,
        }
    }
}

impl Database {
    #[instrument(target = "db", level = "info")]
    pub async fn new(database_path: &str) -> Result<Self> {
        info!(target: TARGET_DB, "Creating database pool for: {}", database_path);

        let connect_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", database_path))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5))
                .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        info!(target: TARGET_DB, "Database pool created");

        let db = Database { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // A single connection that never recycles, or the data disappears with it
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await?;

        let db = Database { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    /// Opens the database named by `DATABASE_PATH`, defaulting to `clusters.db`.
    pub async fn from_env() -> Result<Self> {
        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "clusters.db".to_string());
        Database::new(&database_path).await
    }

    /// Collect row counts from the main tables
    pub async fn collect_stats(&self) -> Result<String> {
        let queries = vec![
            "SELECT COUNT(*) FROM news_items;",
            "SELECT COUNT(*) FROM news_items WHERE cluster_id IS NULL;",
            "SELECT COUNT(*) FROM story_clusters;",
            "SELECT COUNT(*) FROM gazetteer_entries;",
        ];

        let mut results = vec![];
        for query in queries {
            let count: i64 = sqlx::query_scalar(query).fetch_one(&self.pool).await?;
            results.push(count);
        }

        Ok(results
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(":"))
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so string order is time order.
pub(crate) fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_db_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| ClusterError::InvalidRecord(format!("bad timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_db_time_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_db_time).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn db_time_round_trips_and_sorts() {
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(to_db_time(&early), "2024-03-01T09:05:00.000Z");
        assert_eq!(parse_db_time(&to_db_time(&late)).unwrap(), late);
        assert!(to_db_time(&early) < to_db_time(&late));
        assert!(parse_db_time("yesterday").is_err());
    }

    #[tokio::test]
    async fn in_memory_database_has_schema() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.collect_stats().await.unwrap(), "0:0:0:0");
    }
}
