use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use super::engine::ClusterEngine;
use super::metadata::derive_meta;
use super::similarity::{find_best_match, lookback_start, ClusterMatch, MatchQuery};
use super::types::{
    AssignOutcome, Assignment, BatchReport, ClusterId, ItemId, NewsItem, StoryCluster,
};
use crate::entity::classification::classify_event;
use crate::entity::normalizer::strip_markup;
use crate::error::{ClusterError, Result};
use crate::store::ClusterStore;
use crate::TARGET_CLUSTER;

impl<S: ClusterStore> ClusterEngine<S> {
    /// Assigns a stored item to a cluster and returns the cluster id.
    ///
    /// Assigning an item that already has a cluster is a no-op returning that cluster.
    pub async fn assign(&self, item_id: ItemId) -> Result<ClusterId> {
        Ok(self.assign_item(item_id).await?.cluster_id())
    }

    /// Like [`assign`](Self::assign), but reports whether a cluster was joined or created.
    pub async fn assign_item(&self, item_id: ItemId) -> Result<AssignOutcome> {
        let item = self.load_item(item_id).await?;
        if let Some(cluster_id) = item.cluster_id {
            return Ok(AssignOutcome::AlreadyAssigned { cluster_id });
        }

        let _guard = self.lock_tenant(&item.site_id).await?;

        let timeout = self.config().assigner.assign_timeout();
        match tokio::time::timeout(timeout, self.assign_locked(item_id)).await {
            Ok(result) => result,
            // Dropping the in-flight future rolls back any open store transaction
            Err(_) => Err(ClusterError::TransientStore(format!(
                "assignment of item {} did not finish within {:?}",
                item_id, timeout
            ))),
        }
    }

    /// Caller holds the tenant lock.
    async fn assign_locked(&self, item_id: ItemId) -> Result<AssignOutcome> {
        // Another task may have assigned the item while we waited for the lock
        let item = self.load_item(item_id).await?;
        if let Some(cluster_id) = item.cluster_id {
            return Ok(AssignOutcome::AlreadyAssigned { cluster_id });
        }

        if strip_markup(&item.title).is_empty() && strip_markup(&item.content).is_empty() {
            let reason = "empty title and content".to_string();
            self.store().reject_item(item_id, &reason).await?;
            return Err(ClusterError::MalformedItem { item_id, reason });
        }

        let normalizer = self.normalizer_for(&item.site_id);
        let normalized = normalizer.normalize(&item.title, &item.content);
        let entities = normalizer.resolve_entities(&item.entities, &normalized.entities);
        let event_type = classify_event(&item.title, &item.content);
        let now = self.now();

        let mut member = item;
        member.entities = entities;

        if normalized.tokens.is_empty() && member.entities.is_empty() {
            debug!(
                target: TARGET_CLUSTER,
                "Item {} has nothing to match on, starting a new cluster", item_id
            );
            return self.found_cluster(member, now).await;
        }

        let matcher = &self.config().matcher;
        let candidates = self
            .store()
            .find_open_clusters(&member.site_id, lookback_start(member.pub_date, matcher))
            .await?;

        let query = MatchQuery {
            site_id: &member.site_id,
            pub_date: member.pub_date,
            entities: &member.entities,
            title_tokens: normalized.title_tokens(),
            event_type,
        };
        let best = find_best_match(&query, &candidates, matcher);

        match best {
            Some(found) => self.join_cluster(member, found, now).await,
            None => {
                debug!(
                    target: TARGET_CLUSTER,
                    "No cluster above {:.2} among {} candidates for item {}",
                    matcher.threshold,
                    candidates.len(),
                    item_id
                );
                self.found_cluster(member, now).await
            }
        }
    }

    async fn found_cluster(&self, member: NewsItem, now: DateTime<Utc>) -> Result<AssignOutcome> {
        let meta = derive_meta(std::slice::from_ref(&member), now, &self.config().scoring)?;
        let seed = assignment_for(&member, None, now);
        let cluster_id = self.store().create_cluster(&seed, &meta).await?;

        info!(
            target: TARGET_CLUSTER,
            "Item {} opened cluster {} for site {}: {}",
            member.id, cluster_id, member.site_id, meta.title
        );
        Ok(AssignOutcome::Created { cluster_id })
    }

    async fn join_cluster(
        &self,
        member: NewsItem,
        found: ClusterMatch,
        now: DateTime<Utc>,
    ) -> Result<AssignOutcome> {
        let mut members = self.store().cluster_items(found.cluster_id).await?;
        let assignment = assignment_for(&member, Some(found.score), now);
        members.push(member);

        let meta = derive_meta(&members, now, &self.config().scoring)?;
        self.store()
            .append_item(found.cluster_id, &assignment, &meta)
            .await?;

        info!(
            target: TARGET_CLUSTER,
            "Item {} joined cluster {} (similarity: {:.4}, sources: {}, dis: {})",
            assignment.item_id, found.cluster_id, found.score, meta.source_count, meta.score.dis
        );
        Ok(AssignOutcome::Joined {
            cluster_id: found.cluster_id,
            score: found.score,
        })
    }

    /// Assigns up to `limit` waiting items, tenants in parallel and each tenant in
    /// submission order.
    ///
    /// Retryable failures are retried with exponential backoff; items that still fail stay
    /// unassigned for the next run and are counted in the report.
    pub async fn assign_pending(
        &self,
        site_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<BatchReport> {
        let limit = limit.unwrap_or(self.config().assigner.batch_size);
        let items = self.store().unassigned_items(site_id, limit).await?;

        let mut by_site: BTreeMap<String, Vec<ItemId>> = BTreeMap::new();
        for item in &items {
            by_site.entry(item.site_id.clone()).or_default().push(item.id);
        }

        let runs = by_site
            .iter()
            .map(|(site_id, item_ids)| self.assign_site_batch(site_id, item_ids));
        let mut report = BatchReport::default();
        for site_report in join_all(runs).await {
            report.merge(&site_report);
        }

        info!(
            target: TARGET_CLUSTER,
            "Assigned {} pending items: {} joined, {} created, {} skipped, {} failed",
            report.processed(),
            report.assigned_existing,
            report.created,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    async fn assign_site_batch(&self, site_id: &str, item_ids: &[ItemId]) -> BatchReport {
        let mut report = BatchReport::default();
        for &item_id in item_ids {
            match self.assign_with_retry(item_id).await {
                Ok(outcome) => report.record(&outcome),
                Err(ClusterError::MalformedItem { item_id, reason }) => {
                    warn!(
                        target: TARGET_CLUSTER,
                        "Skipping malformed item {} for site {}: {}", item_id, site_id, reason
                    );
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(
                        target: TARGET_CLUSTER,
                        "Failed to assign item {} for site {}: {}", item_id, site_id, e
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn assign_with_retry(&self, item_id: ItemId) -> Result<AssignOutcome> {
        let max_attempts = self.config().assigner.max_attempts;
        let mut attempt = 1;
        loop {
            match self.assign_item(item_id).await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config().assigner.retry_delay(attempt);
                    warn!(
                        target: TARGET_CLUSTER,
                        "Attempt {}/{} for item {} failed ({}), retrying in {:?}",
                        attempt, max_attempts, item_id, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Recomputes every derived field and the score of one cluster from its stored members.
    pub async fn refresh_cluster(&self, cluster_id: ClusterId) -> Result<StoryCluster> {
        let cluster = self.load_cluster(cluster_id).await?;
        let _guard = self.lock_tenant(&cluster.site_id).await?;

        let members = self.store().cluster_items(cluster_id).await?;
        let meta = derive_meta(&members, self.now(), &self.config().scoring)?;
        self.store().update_cluster_meta(cluster_id, &meta).await?;

        info!(
            target: TARGET_CLUSTER,
            "Refreshed cluster {}: {} items from {} sources", cluster_id, meta.item_count, meta.source_count
        );
        self.load_cluster(cluster_id).await
    }

    async fn load_item(&self, item_id: ItemId) -> Result<NewsItem> {
        self.store()
            .get_item(item_id)
            .await?
            .ok_or(ClusterError::NotFound {
                entity: "news item",
                id: item_id,
            })
    }

    pub(crate) async fn load_cluster(&self, cluster_id: ClusterId) -> Result<StoryCluster> {
        self.store()
            .get_cluster(cluster_id)
            .await?
            .ok_or(ClusterError::NotFound {
                entity: "cluster",
                id: cluster_id,
            })
    }
}

fn assignment_for(member: &NewsItem, similarity: Option<f64>, now: DateTime<Utc>) -> Assignment {
    Assignment {
        item_id: member.id,
        site_id: member.site_id.clone(),
        entities: member.entities.clone(),
        similarity,
        assigned_at: now,
    }
}
