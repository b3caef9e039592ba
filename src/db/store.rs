use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::core::Database;
use crate::clustering::{
    Assignment, ClusterFilter, ClusterId, ClusterMeta, ClusterScore, ItemId, NewItem, NewsItem,
    StoryCluster,
};
use crate::entity::GazetteerEntry;
use crate::error::Result;
use crate::store::ClusterStore;

#[async_trait]
impl ClusterStore for Database {
    async fn insert_item(&self, item: &NewItem) -> Result<ItemId> {
        self.insert_news_item(item).await
    }

    async fn get_item(&self, item_id: ItemId) -> Result<Option<NewsItem>> {
        self.fetch_news_item(item_id).await
    }

    async fn reject_item(&self, item_id: ItemId, reason: &str) -> Result<()> {
        self.reject_news_item(item_id, reason).await
    }

    async fn unassigned_items(&self, site_id: Option<&str>, limit: usize) -> Result<Vec<NewsItem>> {
        self.fetch_unassigned_items(site_id, limit).await
    }

    async fn find_open_clusters(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoryCluster>> {
        self.fetch_open_clusters(site_id, since).await
    }

    async fn get_cluster(&self, cluster_id: ClusterId) -> Result<Option<StoryCluster>> {
        self.fetch_story_cluster(cluster_id).await
    }

    async fn cluster_items(&self, cluster_id: ClusterId) -> Result<Vec<NewsItem>> {
        self.fetch_cluster_items(cluster_id).await
    }

    async fn recent_cluster_items(
        &self,
        cluster_id: ClusterId,
        limit: usize,
    ) -> Result<Vec<NewsItem>> {
        self.fetch_recent_cluster_items(cluster_id, limit).await
    }

    async fn list_clusters(&self, filter: &ClusterFilter) -> Result<Vec<StoryCluster>> {
        self.fetch_clusters(filter).await
    }

    async fn create_cluster(&self, seed: &Assignment, meta: &ClusterMeta) -> Result<ClusterId> {
        self.create_story_cluster(seed, meta).await
    }

    async fn append_item(
        &self,
        cluster_id: ClusterId,
        item: &Assignment,
        meta: &ClusterMeta,
    ) -> Result<()> {
        self.append_cluster_item(cluster_id, item, meta).await
    }

    async fn update_cluster_meta(&self, cluster_id: ClusterId, meta: &ClusterMeta) -> Result<()> {
        self.update_story_cluster_meta(cluster_id, meta).await
    }

    async fn update_cluster_score(
        &self,
        cluster_id: ClusterId,
        score: &ClusterScore,
    ) -> Result<()> {
        self.update_story_cluster_score(cluster_id, score).await
    }

    async fn gazetteer_entries(&self) -> Result<Vec<GazetteerEntry>> {
        self.fetch_gazetteer_entries().await
    }
}
