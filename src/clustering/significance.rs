//! Discussion-intensity score and trend
//!
//! Scores are a pure function of a cluster's member timeline and a reference time, never
//! of the previously stored score, so a repeated or racing rescore only rewrites the same
//! value.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use super::engine::ClusterEngine;
use super::types::{ClusterId, ClusterScore, NewsItem, SweepReport, Trend};
use crate::config::ScoringConfig;
use crate::error::{ClusterError, Result};
use crate::store::ClusterStore;
use crate::TARGET_SCORING;

const MAX_DIS: f64 = 100.0;

/// The member facts scoring depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub source_count: usize,
    pub tier1_count: usize,
    pub latest_item: DateTime<Utc>,
    pub pub_dates: Vec<DateTime<Utc>>,
}

impl Timeline {
    /// Returns `None` for an empty member list
    pub fn from_items(items: &[NewsItem]) -> Option<Self> {
        let latest_item = items.iter().map(|i| i.pub_date).max()?;
        let sources: std::collections::HashSet<&str> =
            items.iter().map(|i| i.source.as_str()).collect();
        Some(Timeline {
            source_count: sources.len(),
            tier1_count: items.iter().filter(|i| i.is_tier1()).count(),
            latest_item,
            pub_dates: items.iter().map(|i| i.pub_date).collect(),
        })
    }

    /// Items published in `(end - window, end]`; dates after `now` count as `now`.
    fn count_between(&self, end: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> usize {
        let start = end - window;
        self.pub_dates
            .iter()
            .map(|date| (*date).min(now))
            .filter(|date| *date > start && *date <= end)
            .count()
    }
}

/// Scores a timeline as of `now`.
pub fn score_timeline(timeline: &Timeline, now: DateTime<Utc>, cfg: &ScoringConfig) -> ClusterScore {
    let window = cfg.velocity_window();
    let window_hours = window.num_seconds() as f64 / 3600.0;

    let current = timeline.count_between(now, window, now);
    let prior = timeline.count_between(now - window, window, now);
    let velocity = if window_hours > 0.0 {
        current as f64 / window_hours
    } else {
        0.0
    };

    let sources = timeline.source_count.min(cfg.source_cap.max(0) as usize) as f64;
    let tier1 = timeline.tier1_count.min(cfg.tier1_cap.max(0) as usize) as f64;
    let raw = cfg.source_weight * sources + cfg.tier1_weight * tier1 + cfg.velocity_weight * velocity;

    let hours_since = ((now - timeline.latest_item).num_seconds().max(0) as f64) / 3600.0;
    let decay = 0.5_f64.powf(hours_since / cfg.decay_half_life_hours);
    let dis = (raw * decay).clamp(0.0, MAX_DIS).round() as i32;

    let trend = if now - timeline.latest_item > cfg.staleness() {
        Trend::Fading
    } else {
        classify_trend(current, prior, cfg)
    };

    ClusterScore {
        dis,
        trend,
        velocity,
        scored_at: now,
    }
}

/// Trend from the item counts of the current and the preceding velocity window.
pub fn classify_trend(current: usize, prior: usize, cfg: &ScoringConfig) -> Trend {
    if current == 0 && prior == 0 {
        return Trend::Cooling;
    }
    if current > 2 * prior && current >= cfg.spike_min_items {
        return Trend::Spiking;
    }
    let delta = (current as f64 - prior as f64).abs();
    if delta <= cfg.flat_tolerance * (prior.max(1) as f64) {
        return Trend::Steady;
    }
    if current > prior {
        Trend::Rising
    } else {
        Trend::Cooling
    }
}

impl<S: ClusterStore> ClusterEngine<S> {
    /// Recomputes and stores one cluster's score from its stored members.
    pub async fn rescore_cluster(&self, cluster_id: ClusterId) -> Result<ClusterScore> {
        let cluster = self
            .store()
            .get_cluster(cluster_id)
            .await?
            .ok_or(ClusterError::NotFound {
                entity: "cluster",
                id: cluster_id,
            })?;

        let _guard = self.lock_tenant(&cluster.site_id).await?;
        let (score, _) = self.rescore_locked(cluster_id, Some((cluster.dis, cluster.trend))).await?;
        Ok(score)
    }

    /// Decay sweep over one tenant's recently active clusters.
    ///
    /// Clusters quiet for longer than the sweep horizon are left with their last score. A
    /// cluster that fails to rescore is logged and counted; the sweep moves on to the next.
    pub async fn rescore_all(&self, site_id: &str) -> Result<SweepReport> {
        let now = self.now();
        let horizon = now - self.config().scoring.sweep_horizon();
        let clusters = self.store().find_open_clusters(site_id, horizon).await?;

        let mut report = SweepReport::default();
        for cluster in clusters {
            report.examined += 1;

            // Lock per cluster so live assignment is never blocked for a whole sweep
            let rescored = match self.lock_tenant(site_id).await {
                Ok(_guard) => {
                    self.rescore_locked(cluster.id, Some((cluster.dis, cluster.trend)))
                        .await
                }
                Err(e) => Err(e),
            };
            let (score, changed) = match rescored {
                Ok(rescored) => rescored,
                Err(e) => {
                    error!(
                        target: TARGET_SCORING,
                        "Failed to rescore cluster {} of site {}: {}", cluster.id, site_id, e
                    );
                    report.failed += 1;
                    continue;
                }
            };
            if changed {
                report.updated += 1;
                debug!(
                    target: TARGET_SCORING,
                    "Cluster {} rescored: dis {} -> {}, trend {} -> {}",
                    cluster.id, cluster.dis, score.dis, cluster.trend, score.trend
                );
            }
        }

        info!(
            target: TARGET_SCORING,
            "Decay sweep for site {}: {} examined, {} changed, {} failed",
            site_id, report.examined, report.updated, report.failed
        );
        Ok(report)
    }

    /// Caller holds the tenant lock.
    async fn rescore_locked(
        &self,
        cluster_id: ClusterId,
        previous: Option<(i32, Trend)>,
    ) -> Result<(ClusterScore, bool)> {
        let items = self.store().cluster_items(cluster_id).await?;
        let Some(timeline) = Timeline::from_items(&items) else {
            warn!(target: TARGET_SCORING, "Cluster {} has no members, not rescoring", cluster_id);
            return Err(ClusterError::InvalidRecord(format!(
                "cluster {} has no members",
                cluster_id
            )));
        };

        let score = score_timeline(&timeline, self.now(), &self.config().scoring);
        self.store().update_cluster_score(cluster_id, &score).await?;

        let changed = previous.map_or(true, |(dis, trend)| dis != score.dis || trend != score.trend);
        Ok((score, changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn timeline(minutes: &[i64], sources: usize, tier1: usize) -> Timeline {
        let pub_dates: Vec<_> = minutes.iter().map(|m| t0() + Duration::minutes(*m)).collect();
        Timeline {
            source_count: sources,
            tier1_count: tier1,
            latest_item: pub_dates.iter().copied().max().unwrap(),
            pub_dates,
        }
    }

    #[test]
    fn test_scenario_cluster_score() {
        let cfg = ScoringConfig::default();
        let score = score_timeline(&timeline(&[0, 5], 2, 1), t0() + Duration::minutes(10), &cfg);
        // 6*2 + 8*1 + 4*2 = 28, five minutes of decay is not enough to lose a point
        assert_eq!(score.dis, 28);
        assert_eq!(score.velocity, 2.0);
        assert_eq!(score.trend, Trend::Rising);
    }

    #[test]
    fn test_caps_saturate() {
        let cfg = ScoringConfig::default();
        let now = t0();
        let eight = score_timeline(&timeline(&[0], 8, 0), now, &cfg);
        let twenty = score_timeline(&timeline(&[0], 20, 0), now, &cfg);
        assert_eq!(eight.dis, twenty.dis);

        let huge = score_timeline(&timeline(&[0; 40], 40, 40), now, &cfg);
        assert_eq!(huge.dis, 100);
    }

    #[test]
    fn test_trend_classes() {
        let cfg = ScoringConfig::default();
        assert_eq!(classify_trend(0, 0, &cfg), Trend::Cooling);
        assert_eq!(classify_trend(6, 2, &cfg), Trend::Spiking);
        assert_eq!(classify_trend(2, 0, &cfg), Trend::Rising);
        assert_eq!(classify_trend(4, 4, &cfg), Trend::Steady);
        assert_eq!(classify_trend(5, 4, &cfg), Trend::Steady);
        assert_eq!(classify_trend(7, 4, &cfg), Trend::Rising);
        assert_eq!(classify_trend(1, 4, &cfg), Trend::Cooling);
    }

    #[test]
    fn test_windows_split_current_and_prior() {
        let cfg = ScoringConfig::default();
        // three items in the prior hour, one in the current one
        let line = timeline(&[-100, -90, -70, -10], 1, 0);
        let score = score_timeline(&line, t0(), &cfg);
        assert_eq!(score.trend, Trend::Cooling);
        assert_eq!(score.velocity, 1.0);
    }

    #[test]
    fn test_future_dates_count_as_now() {
        let cfg = ScoringConfig::default();
        let line = timeline(&[30], 1, 1);
        let score = score_timeline(&line, t0(), &cfg);
        assert_eq!(score.velocity, 1.0);
        assert_ne!(score.trend, Trend::Fading);
    }

    #[test]
    fn test_stale_cluster_fades_and_decays() {
        let cfg = ScoringConfig::default();
        let line = timeline(&[0, 1, 2, 3], 4, 2);
        let mut last_dis = i32::MAX;
        for hours in [7, 12, 24, 48, 96] {
            let score = score_timeline(&line, t0() + Duration::hours(hours), &cfg);
            assert_eq!(score.trend, Trend::Fading);
            assert!(score.dis <= last_dis);
            last_dis = score.dis;
        }
        assert_eq!(last_dis, 0);
    }

    #[test]
    fn test_scoring_is_order_independent() {
        let cfg = ScoringConfig::default();
        let now = t0() + Duration::minutes(20);
        let a = score_timeline(&timeline(&[0, 5, 15], 3, 1), now, &cfg);
        let b = score_timeline(&timeline(&[15, 0, 5], 3, 1), now, &cfg);
        assert_eq!(a, b);
        assert_eq!(a, score_timeline(&timeline(&[15, 0, 5], 3, 1), now, &cfg));
    }
}
