use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL,
                source_tier INTEGER NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                pub_date TEXT NOT NULL,
                entities TEXT NOT NULL DEFAULT '[]', -- JSON array of names
                cluster_id INTEGER, -- NULL until assigned, then never changed
                similarity REAL,
                created_at TEXT NOT NULL,
                assigned_at TEXT,
                rejected_reason TEXT, -- set when the item can never be clustered
                FOREIGN KEY (cluster_id) REFERENCES story_clusters (id)
            );
            CREATE INDEX IF NOT EXISTS idx_news_items_unassigned ON news_items (cluster_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_news_items_cluster_assigned ON news_items (cluster_id, assigned_at);
            CREATE INDEX IF NOT EXISTS idx_news_items_cluster_pub_date ON news_items (cluster_id, pub_date);
            CREATE INDEX IF NOT EXISTS idx_news_items_site ON news_items (site_id);

            CREATE TABLE IF NOT EXISTS story_clusters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id TEXT NOT NULL,
                title TEXT NOT NULL,
                title_tier INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                category TEXT,
                entities TEXT NOT NULL DEFAULT '[]', -- JSON array, union of member entities
                dis INTEGER NOT NULL DEFAULT 0,
                trend TEXT NOT NULL,
                velocity REAL NOT NULL DEFAULT 0,
                source_count INTEGER NOT NULL,
                tier1_count INTEGER NOT NULL,
                item_count INTEGER NOT NULL,
                first_seen TEXT NOT NULL,
                latest_item TEXT NOT NULL,
                scored_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_story_clusters_site_latest ON story_clusters (site_id, latest_item);
            CREATE INDEX IF NOT EXISTS idx_story_clusters_site_dis ON story_clusters (site_id, dis);
            CREATE INDEX IF NOT EXISTS idx_story_clusters_event_type ON story_clusters (site_id, event_type);

            CREATE TABLE IF NOT EXISTS gazetteer_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_id TEXT NOT NULL DEFAULT '', -- '' applies to every site
                alias TEXT NOT NULL,
                canonical TEXT NOT NULL,
                kind TEXT NOT NULL, -- TEAM, LEAGUE, PLAYER, OTHER
                created_at TEXT NOT NULL,
                UNIQUE (site_id, alias)
            );
            "#,
        )
        .execute(&mut *conn)
        .await?;

        info!(target: TARGET_DB, "Database schema initialized");
        Ok(())
    }
}
