use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use super::core::{parse_db_time, parse_db_time_opt, to_db_time, Database};
use crate::clustering::{ClusterId, ItemId, NewItem, NewsItem};
use crate::error::{ClusterError, Result};
use crate::TARGET_DB;

const ITEM_COLUMNS: &str = "id, site_id, title, content, source, source_tier, url, pub_date, \
     entities, cluster_id, similarity, created_at, assigned_at";

impl Database {
    /// Stores a fetched item as unassigned
    ///
    /// # Arguments
    /// * `item` - Feed record; entity names are stored exactly as supplied
    ///
    /// # Returns
    /// * `Ok(id)` - Id of the new row
    /// * `Err(InvalidRecord)` - If the record has no tenant or a tier below 1
    #[instrument(target = "db", level = "debug", skip(self, item), fields(site_id = %item.site_id))]
    pub async fn insert_news_item(&self, item: &NewItem) -> Result<ItemId> {
        if item.site_id.trim().is_empty() {
            return Err(ClusterError::InvalidRecord("news item without site id".to_string()));
        }
        if item.source_tier < 1 {
            return Err(ClusterError::InvalidRecord(format!(
                "source tier must be 1 or higher, got {}",
                item.source_tier
            )));
        }

        let entities: BTreeSet<&str> = item
            .entities
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .collect();

        let result = sqlx::query(
            r#"
            INSERT INTO news_items (site_id, title, content, source, source_tier, url, pub_date, entities, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.site_id)
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.source)
        .bind(item.source_tier)
        .bind(&item.url)
        .bind(to_db_time(&item.pub_date))
        .bind(serde_json::to_string(&entities)?)
        .bind(to_db_time(&Utc::now()))
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();
        debug!(target: TARGET_DB, "Inserted news item {} for site {}", id, item.site_id);
        Ok(id)
    }

    pub async fn fetch_news_item(&self, item_id: ItemId) -> Result<Option<NewsItem>> {
        let row = sqlx::query(&format!("SELECT {} FROM news_items WHERE id = ?", ITEM_COLUMNS))
            .bind(item_id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(item_from_row).transpose()
    }

    pub async fn reject_news_item(&self, item_id: ItemId, reason: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE news_items SET rejected_reason = ? WHERE id = ? AND cluster_id IS NULL",
        )
        .bind(reason)
        .bind(item_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(ClusterError::NotFound {
                entity: "unassigned news item",
                id: item_id,
            });
        }
        debug!(target: TARGET_DB, "Rejected news item {}: {}", item_id, reason);
        Ok(())
    }

    /// Unassigned, unrejected items in submission order
    pub async fn fetch_unassigned_items(
        &self,
        site_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        let rows = match site_id {
            Some(site_id) => {
                sqlx::query(&format!(
                    "SELECT {} FROM news_items WHERE cluster_id IS NULL AND rejected_reason IS NULL AND site_id = ? \
                     ORDER BY created_at ASC, id ASC LIMIT ?",
                    ITEM_COLUMNS
                ))
                .bind(site_id)
                .bind(limit as i64)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {} FROM news_items WHERE cluster_id IS NULL AND rejected_reason IS NULL \
                     ORDER BY created_at ASC, id ASC LIMIT ?",
                    ITEM_COLUMNS
                ))
                .bind(limit as i64)
                .fetch_all(self.pool())
                .await?
            }
        };

        rows.iter().map(item_from_row).collect()
    }

    /// Every member of a cluster in the order it joined
    pub async fn fetch_cluster_items(&self, cluster_id: ClusterId) -> Result<Vec<NewsItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM news_items WHERE cluster_id = ? ORDER BY assigned_at ASC, id ASC",
            ITEM_COLUMNS
        ))
        .bind(cluster_id)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(item_from_row).collect()
    }

    pub async fn fetch_recent_cluster_items(
        &self,
        cluster_id: ClusterId,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM news_items WHERE cluster_id = ? ORDER BY pub_date DESC, id DESC LIMIT ?",
            ITEM_COLUMNS
        ))
        .bind(cluster_id)
        .bind(limit as i64)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(item_from_row).collect()
    }
}

pub(crate) fn item_from_row(row: &SqliteRow) -> Result<NewsItem> {
    let entities: String = row.try_get("entities")?;
    let pub_date: String = row.try_get("pub_date")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(NewsItem {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        source: row.try_get("source")?,
        source_tier: row.try_get("source_tier")?,
        url: row.try_get("url")?,
        pub_date: parse_db_time(&pub_date)?,
        entities: serde_json::from_str(&entities)?,
        cluster_id: row.try_get("cluster_id")?,
        similarity: row.try_get("similarity")?,
        created_at: parse_db_time(&created_at)?,
        assigned_at: parse_db_time_opt(row.try_get("assigned_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    fn new_item(site_id: &str, title: &str, tier: i32) -> NewItem {
        NewItem {
            site_id: site_id.to_string(),
            title: title.to_string(),
            content: String::new(),
            source: "index.hr".to_string(),
            source_tier: tier,
            url: "https://index.hr/sport/1".to_string(),
            pub_date: Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap(),
            entities: vec!["Arsenal".to_string(), " ".to_string(), "Chelsea".to_string()],
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_item() {
        let db = Database::in_memory().await.unwrap();
        let id = db.insert_news_item(&new_item("s1", "Arsenal - Chelsea", 1)).await.unwrap();

        let item = db.fetch_news_item(id).await.unwrap().unwrap();
        assert_eq!(item.title, "Arsenal - Chelsea");
        assert_eq!(item.entities.len(), 2);
        assert!(item.cluster_id.is_none());
        assert!(item.assigned_at.is_none());
        assert_eq!(item.pub_date, Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap());

        assert!(db.fetch_news_item(id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_rejects_bad_records() {
        let db = Database::in_memory().await.unwrap();
        assert_matches!(
            db.insert_news_item(&new_item(" ", "x", 1)).await,
            Err(ClusterError::InvalidRecord(_))
        );
        assert_matches!(
            db.insert_news_item(&new_item("s1", "x", 0)).await,
            Err(ClusterError::InvalidRecord(_))
        );
    }

    #[tokio::test]
    async fn unassigned_items_are_scoped_and_ordered() {
        let db = Database::in_memory().await.unwrap();
        let a = db.insert_news_item(&new_item("s1", "a", 1)).await.unwrap();
        let _b = db.insert_news_item(&new_item("s2", "b", 1)).await.unwrap();
        let c = db.insert_news_item(&new_item("s1", "c", 1)).await.unwrap();

        let site1: Vec<_> = db
            .fetch_unassigned_items(Some("s1"), 10)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(site1, vec![a, c]);
        assert_eq!(db.fetch_unassigned_items(None, 2).await.unwrap().len(), 2);
    }
}
