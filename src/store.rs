use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::clustering::{
    Assignment, ClusterFilter, ClusterId, ClusterMeta, ClusterScore, ItemId, NewItem, NewsItem,
    StoryCluster,
};
use crate::entity::GazetteerEntry;
use crate::error::Result;

/// Persistence contract used by the clustering core.
///
/// Every method is one transaction: a write either lands completely or not at all.
/// Membership writes are conditional on the item still being unassigned and report a
/// lost race as [`ClusterError::ConcurrencyConflict`](crate::error::ClusterError).
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Stores a fetched item in the unassigned state and returns its id.
    async fn insert_item(&self, item: &NewItem) -> Result<ItemId>;

    async fn get_item(&self, item_id: ItemId) -> Result<Option<NewsItem>>;

    /// Marks an item that can never be clustered so batch runs stop picking it up.
    async fn reject_item(&self, item_id: ItemId, reason: &str) -> Result<()>;

    /// Unassigned, unrejected items, oldest first, optionally for one tenant.
    async fn unassigned_items(&self, site_id: Option<&str>, limit: usize) -> Result<Vec<NewsItem>>;

    /// Clusters of one tenant whose latest item is at or after `since`.
    async fn find_open_clusters(
        &self,
        site_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<StoryCluster>>;

    async fn get_cluster(&self, cluster_id: ClusterId) -> Result<Option<StoryCluster>>;

    /// All members in assignment order.
    async fn cluster_items(&self, cluster_id: ClusterId) -> Result<Vec<NewsItem>>;

    /// Most recent members by publication date.
    async fn recent_cluster_items(
        &self,
        cluster_id: ClusterId,
        limit: usize,
    ) -> Result<Vec<NewsItem>>;

    /// Clusters matching a dashboard filter, most recently active first.
    async fn list_clusters(&self, filter: &ClusterFilter) -> Result<Vec<StoryCluster>>;

    /// Creates a cluster from `meta` and makes the seed item its first member.
    async fn create_cluster(&self, seed: &Assignment, meta: &ClusterMeta) -> Result<ClusterId>;

    /// Adds an item to an existing cluster and rewrites the derived fields.
    async fn append_item(
        &self,
        cluster_id: ClusterId,
        item: &Assignment,
        meta: &ClusterMeta,
    ) -> Result<()>;

    async fn update_cluster_meta(&self, cluster_id: ClusterId, meta: &ClusterMeta) -> Result<()>;

    async fn update_cluster_score(&self, cluster_id: ClusterId, score: &ClusterScore)
        -> Result<()>;

    /// Tenant-maintained aliases layered over the built-in gazetteer.
    async fn gazetteer_entries(&self) -> Result<Vec<GazetteerEntry>>;
}
