use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

use super::types::{ClusterId, StoryCluster};
use crate::config::MatcherConfig;
use crate::entity::normalizer::title_tokens;
use crate::entity::EventType;

/// What the matcher knows about an incoming item.
#[derive(Debug, Clone)]
pub struct MatchQuery<'a> {
    pub site_id: &'a str,
    pub pub_date: DateTime<Utc>,
    pub entities: &'a BTreeSet<String>,
    pub title_tokens: &'a [String],
    pub event_type: EventType,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterMatch {
    pub cluster_id: ClusterId,
    pub score: f64,
}

/// Component scores for one query/cluster pair, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityBreakdown {
    pub entity: f64,
    pub title: f64,
    pub recency: f64,
    pub combined: f64,
}

/// Jaccard index; two empty sets share nothing.
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn word_bigrams(tokens: &[String]) -> HashSet<(&str, &str)> {
    tokens
        .windows(2)
        .map(|pair| (pair[0].as_str(), pair[1].as_str()))
        .collect()
}

/// Headline similarity: the better of token-set overlap and word-bigram overlap.
pub fn title_similarity(a: &[String], b: &[String]) -> f64 {
    let tokens_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let tokens_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let token_score = jaccard(&tokens_a, &tokens_b);
    let shingle_score = jaccard(&word_bigrams(a), &word_bigrams(b));
    token_score.max(shingle_score)
}

/// Linear falloff from 1 (same instant) to 0 (a full lookback window apart).
pub fn recency_score(item_date: DateTime<Utc>, cluster_latest: DateTime<Utc>, cfg: &MatcherConfig) -> f64 {
    let window = cfg.lookback().num_milliseconds() as f64;
    if window <= 0.0 {
        return 0.0;
    }
    let gap = (item_date - cluster_latest).num_milliseconds().abs() as f64;
    (1.0 - gap / window).clamp(0.0, 1.0)
}

pub fn similarity_breakdown(
    query: &MatchQuery<'_>,
    cluster: &StoryCluster,
    cfg: &MatcherConfig,
) -> SimilarityBreakdown {
    let query_entities: HashSet<&str> = query.entities.iter().map(String::as_str).collect();
    let cluster_entities: HashSet<&str> = cluster.entities.iter().map(String::as_str).collect();

    let entity = jaccard(&query_entities, &cluster_entities);
    let title = title_similarity(query.title_tokens, &title_tokens(&cluster.title));
    let recency = recency_score(query.pub_date, cluster.latest_item, cfg);
    let combined =
        cfg.entity_weight * entity + cfg.title_weight * title + cfg.recency_weight * recency;

    SimilarityBreakdown {
        entity,
        title,
        recency,
        combined,
    }
}

/// Two specific event types only match each other; General matches anything.
pub fn events_compatible(a: EventType, b: EventType) -> bool {
    !a.is_specific() || !b.is_specific() || a == b
}

/// Oldest `latest_item` a candidate may have for an item published at `pub_date`.
pub fn lookback_start(pub_date: DateTime<Utc>, cfg: &MatcherConfig) -> DateTime<Utc> {
    pub_date
        .checked_sub_signed(cfg.lookback())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Whether a cluster may be scored against the query at all
pub fn is_candidate(query: &MatchQuery<'_>, cluster: &StoryCluster, cfg: &MatcherConfig) -> bool {
    cluster.site_id == query.site_id
        && cluster.latest_item >= lookback_start(query.pub_date, cfg)
        && events_compatible(query.event_type, cluster.event_type)
}

/// Best cluster scoring at least the threshold.
///
/// Equal scores go to the cluster with more tier-1 coverage, then the one seen first, then
/// the lower id, so identical inputs always produce the same answer.
pub fn find_best_match(
    query: &MatchQuery<'_>,
    candidates: &[StoryCluster],
    cfg: &MatcherConfig,
) -> Option<ClusterMatch> {
    candidates
        .iter()
        .filter(|cluster| is_candidate(query, cluster, cfg))
        .map(|cluster| (cluster, similarity_breakdown(query, cluster, cfg).combined))
        .filter(|(_, score)| *score >= cfg.threshold)
        .max_by(|(a, score_a), (b, score_b)| {
            score_a
                .partial_cmp(score_b)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.tier1_count.cmp(&b.tier1_count))
                .then_with(|| b.first_seen.cmp(&a.first_seen))
                .then_with(|| b.id.cmp(&a.id))
        })
        .map(|(cluster, score)| ClusterMatch {
            cluster_id: cluster.id,
            score,
        })
}
