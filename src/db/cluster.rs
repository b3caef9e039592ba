use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, Transaction};
use tracing::{debug, info, instrument};

use super::core::{parse_db_time, to_db_time, Database};
use crate::clustering::{
    Assignment, ClusterFilter, ClusterId, ClusterMeta, ClusterScore, StoryCluster, Trend,
};
use crate::entity::{Category, EventType};
use crate::error::{ClusterError, Result};
use crate::TARGET_DB;

const CLUSTER_COLUMNS: &str = "id, site_id, title, title_tier, event_type, category, entities, \
     dis, trend, velocity, source_count, tier1_count, item_count, first_seen, latest_item, \
     scored_at, created_at, updated_at";

impl Database {
    /// Creates a cluster and makes the seed item its founding member
    ///
    /// Both writes share one transaction. If the seed item was assigned by someone else in
    /// the meantime nothing is written.
    ///
    /// # Arguments
    /// * `seed` - Membership write for the founding item
    /// * `meta` - Derived fields computed from the seed item alone
    ///
    /// # Returns
    /// * `Ok(cluster_id)` - Id of the new cluster
    /// * `Err(ConcurrencyConflict)` - If the item is already assigned
    #[instrument(target = "db", level = "debug", skip(self, seed, meta), fields(item_id = seed.item_id))]
    pub async fn create_story_cluster(
        &self,
        seed: &Assignment,
        meta: &ClusterMeta,
    ) -> Result<ClusterId> {
        let mut tx = self.pool().begin().await?;
        let now = to_db_time(&seed.assigned_at);

        let result = sqlx::query(
            r#"
            INSERT INTO story_clusters (
                site_id, title, title_tier, event_type, category, entities, dis, trend, velocity,
                source_count, tier1_count, item_count, first_seen, latest_item, scored_at,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&seed.site_id)
        .bind(&meta.title)
        .bind(meta.title_tier)
        .bind(meta.event_type.as_str())
        .bind(meta.category.map(|c| c.as_str()))
        .bind(serde_json::to_string(&meta.entities)?)
        .bind(meta.score.dis)
        .bind(meta.score.trend.as_str())
        .bind(meta.score.velocity)
        .bind(meta.source_count)
        .bind(meta.tier1_count)
        .bind(meta.item_count)
        .bind(to_db_time(&meta.first_seen))
        .bind(to_db_time(&meta.latest_item))
        .bind(to_db_time(&meta.score.scored_at))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let cluster_id = result.last_insert_rowid();
        claim_item(&mut tx, cluster_id, seed).await?;
        tx.commit().await?;

        info!(
            target: TARGET_DB,
            "Created cluster {} for site {} from item {}", cluster_id, seed.site_id, seed.item_id
        );
        Ok(cluster_id)
    }

    /// Adds an item to a cluster and rewrites the cluster's derived fields in one transaction
    #[instrument(target = "db", level = "debug", skip(self, item, meta), fields(item_id = item.item_id))]
    pub async fn append_cluster_item(
        &self,
        cluster_id: ClusterId,
        item: &Assignment,
        meta: &ClusterMeta,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        claim_item(&mut tx, cluster_id, item).await?;
        write_meta(&mut tx, cluster_id, &item.site_id, meta, &item.assigned_at).await?;
        tx.commit().await?;

        debug!(
            target: TARGET_DB,
            "Appended item {} to cluster {}", item.item_id, cluster_id
        );
        Ok(())
    }

    pub async fn update_story_cluster_meta(
        &self,
        cluster_id: ClusterId,
        meta: &ClusterMeta,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        let site_id: Option<String> =
            sqlx::query_scalar("SELECT site_id FROM story_clusters WHERE id = ?")
                .bind(cluster_id)
                .fetch_optional(&mut *tx)
                .await?;
        let site_id = site_id.ok_or(ClusterError::NotFound {
            entity: "cluster",
            id: cluster_id,
        })?;

        write_meta(&mut tx, cluster_id, &site_id, meta, &meta.score.scored_at).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn update_story_cluster_score(
        &self,
        cluster_id: ClusterId,
        score: &ClusterScore,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE story_clusters
            SET dis = ?, trend = ?, velocity = ?, scored_at = ?
            WHERE id = ?
            "#,
        )
        .bind(score.dis)
        .bind(score.trend.as_str())
        .bind(score.velocity)
        .bind(to_db_time(&score.scored_at))
        .bind(cluster_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(ClusterError::NotFound {
                entity: "cluster",
                id: cluster_id,
            });
        }
        Ok(())
    }

    pub async fn fetch_story_cluster(&self, cluster_id: ClusterId) -> Result<Option<StoryCluster>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM story_clusters WHERE id = ?",
            CLUSTER_COLUMNS
        ))
        .bind(cluster_id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(cluster_from_row).transpose()
    }

    /// Clusters of one tenant still active at or after `since`
    pub async fn fetch_open_clusters(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoryCluster>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM story_clusters WHERE site_id = ? AND latest_item >= ? \
             ORDER BY latest_item DESC, id ASC",
            CLUSTER_COLUMNS
        ))
        .bind(site_id)
        .bind(to_db_time(&since))
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(cluster_from_row).collect()
    }

    pub async fn fetch_clusters(&self, filter: &ClusterFilter) -> Result<Vec<StoryCluster>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM story_clusters WHERE site_id = ",
            CLUSTER_COLUMNS
        ));
        builder.push_bind(&filter.site_id);

        if let Some(event_type) = filter.event_type {
            builder.push(" AND event_type = ").push_bind(event_type.as_str());
        }
        if let Some(min_dis) = filter.min_dis {
            builder.push(" AND dis >= ").push_bind(min_dis);
        }
        if let Some(since) = filter.since {
            builder.push(" AND latest_item >= ").push_bind(to_db_time(&since));
        }
        if let Some(until) = filter.until {
            builder.push(" AND latest_item <= ").push_bind(to_db_time(&until));
        }
        builder.push(" ORDER BY latest_item DESC, id ASC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(self.pool()).await?;
        rows.iter().map(cluster_from_row).collect()
    }
}

/// Sets the item's cluster, but only while it is still unassigned.
async fn claim_item(
    tx: &mut Transaction<'_, Sqlite>,
    cluster_id: ClusterId,
    item: &Assignment,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE news_items
        SET cluster_id = ?, similarity = ?, entities = ?, assigned_at = ?
        WHERE id = ? AND site_id = ? AND cluster_id IS NULL
        "#,
    )
    .bind(cluster_id)
    .bind(item.similarity)
    .bind(serde_json::to_string(&item.entities)?)
    .bind(to_db_time(&item.assigned_at))
    .bind(item.item_id)
    .bind(&item.site_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() != 1 {
        return Err(ClusterError::ConcurrencyConflict(format!(
            "news item {} is no longer unassigned",
            item.item_id
        )));
    }
    Ok(())
}

async fn write_meta(
    tx: &mut Transaction<'_, Sqlite>,
    cluster_id: ClusterId,
    site_id: &str,
    meta: &ClusterMeta,
    updated_at: &DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE story_clusters
        SET title = ?, title_tier = ?, event_type = ?, category = ?, entities = ?,
            dis = ?, trend = ?, velocity = ?, source_count = ?, tier1_count = ?,
            item_count = ?, first_seen = ?, latest_item = ?, scored_at = ?, updated_at = ?
        WHERE id = ? AND site_id = ?
        "#,
    )
    .bind(&meta.title)
    .bind(meta.title_tier)
    .bind(meta.event_type.as_str())
    .bind(meta.category.map(|c| c.as_str()))
    .bind(serde_json::to_string(&meta.entities)?)
    .bind(meta.score.dis)
    .bind(meta.score.trend.as_str())
    .bind(meta.score.velocity)
    .bind(meta.source_count)
    .bind(meta.tier1_count)
    .bind(meta.item_count)
    .bind(to_db_time(&meta.first_seen))
    .bind(to_db_time(&meta.latest_item))
    .bind(to_db_time(&meta.score.scored_at))
    .bind(to_db_time(updated_at))
    .bind(cluster_id)
    .bind(site_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() != 1 {
        return Err(ClusterError::NotFound {
            entity: "cluster",
            id: cluster_id,
        });
    }
    Ok(())
}

pub(crate) fn cluster_from_row(row: &SqliteRow) -> Result<StoryCluster> {
    let event_type: String = row.try_get("event_type")?;
    let category: Option<String> = row.try_get("category")?;
    let entities: String = row.try_get("entities")?;
    let trend: String = row.try_get("trend")?;
    let first_seen: String = row.try_get("first_seen")?;
    let latest_item: String = row.try_get("latest_item")?;
    let scored_at: String = row.try_get("scored_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(StoryCluster {
        id: row.try_get("id")?,
        site_id: row.try_get("site_id")?,
        title: row.try_get("title")?,
        title_tier: row.try_get("title_tier")?,
        event_type: event_type.parse::<EventType>()?,
        category: category.as_deref().map(str::parse::<Category>).transpose()?,
        entities: serde_json::from_str(&entities)?,
        dis: row.try_get("dis")?,
        trend: trend.parse::<Trend>()?,
        velocity: row.try_get("velocity")?,
        source_count: row.try_get("source_count")?,
        tier1_count: row.try_get("tier1_count")?,
        item_count: row.try_get("item_count")?,
        first_seen: parse_db_time(&first_seen)?,
        latest_item: parse_db_time(&latest_item)?,
        scored_at: parse_db_time(&scored_at)?,
        created_at: parse_db_time(&created_at)?,
        updated_at: parse_db_time(&updated_at)?,
    })
}
