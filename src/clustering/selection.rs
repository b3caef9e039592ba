use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::debug;

use super::engine::ClusterEngine;
use super::types::{ClusterDetail, ClusterFilter, ClusterId, ItemSnippet, StoryCluster, TopStory};
use crate::config::SelectionConfig;
use crate::entity::classification::derive_category;
use crate::error::Result;
use crate::store::ClusterStore;
use crate::TARGET_CLUSTER;

/// Page size for dashboard listings without an explicit limit
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Orders fresh, significant clusters for the top-story picker.
///
/// Drops clusters that are excluded, stale relative to `now`, or under the score floor,
/// then sorts by score, freshness and id.
pub fn rank_top_stories(
    clusters: Vec<StoryCluster>,
    exclude: &HashSet<ClusterId>,
    now: DateTime<Utc>,
    cfg: &SelectionConfig,
    limit: usize,
) -> Vec<StoryCluster> {
    let fresh_since = now - cfg.freshness();
    let mut ranked: Vec<StoryCluster> = clusters
        .into_iter()
        .filter(|c| !exclude.contains(&c.id))
        .filter(|c| c.latest_item >= fresh_since && c.dis >= cfg.min_dis)
        .collect();

    ranked.sort_by(|a, b| {
        b.dis
            .cmp(&a.dis)
            .then_with(|| b.latest_item.cmp(&a.latest_item))
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked.truncate(limit);
    ranked
}

/// Fills in the keyword-derived category for clusters stored without one.
pub fn with_category(mut cluster: StoryCluster) -> StoryCluster {
    if cluster.category.is_none() {
        cluster.category = Some(derive_category(&cluster.title));
    }
    cluster
}

impl<S: ClusterStore> ClusterEngine<S> {
    /// Highest scoring fresh clusters of a tenant with their most recent items.
    ///
    /// Read-only: scores are used as stored, run [`rescore_all`](Self::rescore_all) first
    /// for fresh ones.
    pub async fn select_top_stories(
        &self,
        site_id: &str,
        limit: Option<usize>,
        exclude_cluster_ids: &[ClusterId],
    ) -> Result<Vec<TopStory>> {
        let cfg = &self.config().selection;
        let now = self.now();
        let limit = limit.unwrap_or(cfg.default_limit);

        let filter = ClusterFilter {
            site_id: site_id.to_string(),
            min_dis: Some(cfg.min_dis),
            since: Some(now - cfg.freshness()),
            ..Default::default()
        };
        let candidates = self.store().list_clusters(&filter).await?;
        let exclude: HashSet<ClusterId> = exclude_cluster_ids.iter().copied().collect();
        let ranked = rank_top_stories(candidates, &exclude, now, cfg, limit);

        let mut stories = Vec::with_capacity(ranked.len());
        for cluster in ranked {
            let items = self
                .store()
                .recent_cluster_items(cluster.id, cfg.supporting_items)
                .await?;
            stories.push(TopStory {
                cluster: with_category(cluster),
                supporting_items: items.iter().map(ItemSnippet::from).collect(),
            });
        }

        debug!(
            target: TARGET_CLUSTER,
            "Selected {} top stories for site {} ({} excluded)",
            stories.len(),
            site_id,
            exclude.len()
        );
        Ok(stories)
    }

    /// Dashboard listing; every returned cluster carries a category.
    pub async fn list_clusters(&self, filter: &ClusterFilter) -> Result<Vec<StoryCluster>> {
        let mut filter = filter.clone();
        filter.limit = Some(filter.limit.unwrap_or(DEFAULT_LIST_LIMIT));

        let clusters = self.store().list_clusters(&filter).await?;
        Ok(clusters.into_iter().map(with_category).collect())
    }

    /// One cluster with its most recent items.
    pub async fn get_cluster(&self, cluster_id: ClusterId) -> Result<ClusterDetail> {
        let cluster = self.load_cluster(cluster_id).await?;
        let items = self
            .store()
            .recent_cluster_items(cluster_id, self.config().selection.supporting_items)
            .await?;

        Ok(ClusterDetail {
            cluster: with_category(cluster),
            items: items.iter().map(ItemSnippet::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::Trend;
    use crate::entity::{Category, EventType};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn cluster(id: ClusterId, dis: i32, latest_minutes_ago: i64) -> StoryCluster {
        let latest = t0() - Duration::minutes(latest_minutes_ago);
        StoryCluster {
            id,
            site_id: "s1".to_string(),
            title: format!("Priča {}", id),
            title_tier: 1,
            event_type: EventType::General,
            category: None,
            entities: Default::default(),
            dis,
            trend: Trend::Steady,
            velocity: 0.0,
            source_count: 1,
            tier1_count: 0,
            item_count: 1,
            first_seen: latest,
            latest_item: latest,
            scored_at: t0(),
            created_at: latest,
            updated_at: latest,
        }
    }

    fn ids(clusters: &[StoryCluster]) -> Vec<ClusterId> {
        clusters.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_order_by_dis_then_freshness_then_id() {
        let cfg = SelectionConfig::default();
        let clusters = vec![
            cluster(1, 30, 60),
            cluster(2, 50, 120),
            cluster(3, 30, 10),
            cluster(4, 30, 10),
        ];
        let ranked = rank_top_stories(clusters, &HashSet::new(), t0(), &cfg, 10);
        assert_eq!(ids(&ranked), vec![2, 3, 4, 1]);
    }

    #[test]
    fn test_excluded_floor_and_stale_clusters_are_dropped() {
        let cfg = SelectionConfig::default();
        let clusters = vec![
            cluster(1, 90, 5),
            cluster(2, 14, 5),
            cluster(3, 40, 25 * 60),
            cluster(4, 20, 5),
        ];
        let exclude: HashSet<ClusterId> = [1].into();
        let ranked = rank_top_stories(clusters, &exclude, t0(), &cfg, 10);
        assert_eq!(ids(&ranked), vec![4]);
    }

    #[test]
    fn test_limit_applies_after_ordering() {
        let cfg = SelectionConfig::default();
        let clusters = (1..=5).map(|id| cluster(id, 20 + id as i32, 5)).collect();
        let ranked = rank_top_stories(clusters, &HashSet::new(), t0(), &cfg, 2);
        assert_eq!(ids(&ranked), vec![5, 4]);
    }

    #[test]
    fn test_missing_category_is_derived_from_title() {
        let mut c = cluster(1, 20, 5);
        c.title = "Rukometaši slave naslov".to_string();
        assert_eq!(with_category(c).category, Some(Category::Handball));

        let mut stored = cluster(2, 20, 5);
        stored.category = Some(Category::Tennis);
        stored.title = "Arsenal slavi".to_string();
        assert_eq!(with_category(stored).category, Some(Category::Tennis));
    }
}
