use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::environment::override_from_env;
use crate::error::{ClusterError, Result};
use crate::TARGET_CLUSTER;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Longest window any hour-based setting may span
pub const MAX_WINDOW_HOURS: i64 = 90 * 24;

/// Longest lock wait or assignment budget
pub const MAX_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Similarity weights and match threshold used by the matcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatcherConfig {
    pub entity_weight: f64,
    pub title_weight: f64,
    pub recency_weight: f64,
    /// Minimum combined score for joining an existing cluster
    pub threshold: f64,
    /// Clusters whose latest item is older than this (relative to the new item) are not candidates
    pub lookback_hours: i64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            entity_weight: 0.45,
            title_weight: 0.40,
            recency_weight: 0.15,
            threshold: 0.62,
            lookback_hours: 48,
        }
    }
}

impl MatcherConfig {
    pub fn lookback(&self) -> Duration {
        Duration::hours(self.lookback_hours)
    }
}

/// Weights, caps and windows for the discussion-intensity score and trend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoringConfig {
    pub source_weight: f64,
    pub source_cap: i32,
    pub tier1_weight: f64,
    pub tier1_cap: i32,
    pub velocity_weight: f64,
    pub velocity_window_minutes: i64,
    pub staleness_hours: i64,
    pub decay_half_life_hours: f64,
    pub spike_min_items: usize,
    pub flat_tolerance: f64,
    /// Clusters quiet for longer than this are left alone by the decay sweep
    pub sweep_horizon_hours: i64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            source_weight: 6.0,
            source_cap: 8,
            tier1_weight: 8.0,
            tier1_cap: 5,
            velocity_weight: 4.0,
            velocity_window_minutes: 60,
            staleness_hours: 6,
            decay_half_life_hours: 12.0,
            spike_min_items: 3,
            flat_tolerance: 0.25,
            sweep_horizon_hours: 72,
        }
    }
}

impl ScoringConfig {
    pub fn velocity_window(&self) -> Duration {
        Duration::minutes(self.velocity_window_minutes)
    }

    pub fn staleness(&self) -> Duration {
        Duration::hours(self.staleness_hours)
    }

    pub fn sweep_horizon(&self) -> Duration {
        Duration::hours(self.sweep_horizon_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectionConfig {
    pub freshness_hours: i64,
    pub min_dis: i32,
    pub supporting_items: usize,
    pub default_limit: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            freshness_hours: 24,
            min_dis: 15,
            supporting_items: 5,
            default_limit: 10,
        }
    }
}

impl SelectionConfig {
    pub fn freshness(&self) -> Duration {
        Duration::hours(self.freshness_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignerConfig {
    pub lock_timeout_ms: u64,
    pub assign_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub batch_size: usize,
}

impl Default for AssignerConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            assign_timeout_ms: 15_000,
            max_attempts: 5,
            retry_base_delay_ms: 200,
            batch_size: 500,
        }
    }
}

impl AssignerConfig {
    pub fn lock_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn assign_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.assign_timeout_ms)
    }

    /// Exponential backoff: base, 2x base, 4x base, ...
    pub fn retry_delay(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        std::time::Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    pub matcher: MatcherConfig,
    pub scoring: ScoringConfig,
    pub selection: SelectionConfig,
    pub assigner: AssignerConfig,
}

impl ClusterConfig {
    /// Defaults overlaid with any `CLUSTER_*` environment variables, then validated.
    pub fn from_env() -> Result<Self> {
        let mut config = ClusterConfig::default();

        let m = &mut config.matcher;
        override_from_env("CLUSTER_ENTITY_WEIGHT", &mut m.entity_weight)?;
        override_from_env("CLUSTER_TITLE_WEIGHT", &mut m.title_weight)?;
        override_from_env("CLUSTER_RECENCY_WEIGHT", &mut m.recency_weight)?;
        override_from_env("CLUSTER_MATCH_THRESHOLD", &mut m.threshold)?;
        override_from_env("CLUSTER_LOOKBACK_HOURS", &mut m.lookback_hours)?;

        let s = &mut config.scoring;
        override_from_env("CLUSTER_SOURCE_WEIGHT", &mut s.source_weight)?;
        override_from_env("CLUSTER_SOURCE_CAP", &mut s.source_cap)?;
        override_from_env("CLUSTER_TIER1_WEIGHT", &mut s.tier1_weight)?;
        override_from_env("CLUSTER_TIER1_CAP", &mut s.tier1_cap)?;
        override_from_env("CLUSTER_VELOCITY_WEIGHT", &mut s.velocity_weight)?;
        override_from_env("CLUSTER_VELOCITY_WINDOW_MINUTES", &mut s.velocity_window_minutes)?;
        override_from_env("CLUSTER_STALENESS_HOURS", &mut s.staleness_hours)?;
        override_from_env("CLUSTER_DECAY_HALF_LIFE_HOURS", &mut s.decay_half_life_hours)?;
        override_from_env("CLUSTER_SPIKE_MIN_ITEMS", &mut s.spike_min_items)?;
        override_from_env("CLUSTER_FLAT_TOLERANCE", &mut s.flat_tolerance)?;
        override_from_env("CLUSTER_SWEEP_HORIZON_HOURS", &mut s.sweep_horizon_hours)?;

        let sel = &mut config.selection;
        override_from_env("CLUSTER_FRESHNESS_HOURS", &mut sel.freshness_hours)?;
        override_from_env("CLUSTER_MIN_DIS", &mut sel.min_dis)?;
        override_from_env("CLUSTER_SUPPORTING_ITEMS", &mut sel.supporting_items)?;
        override_from_env("CLUSTER_TOP_STORIES_LIMIT", &mut sel.default_limit)?;

        let a = &mut config.assigner;
        override_from_env("CLUSTER_LOCK_TIMEOUT_MS", &mut a.lock_timeout_ms)?;
        override_from_env("CLUSTER_ASSIGN_TIMEOUT_MS", &mut a.assign_timeout_ms)?;
        override_from_env("CLUSTER_MAX_ATTEMPTS", &mut a.max_attempts)?;
        override_from_env("CLUSTER_RETRY_BASE_DELAY_MS", &mut a.retry_base_delay_ms)?;
        override_from_env("CLUSTER_BATCH_SIZE", &mut a.batch_size)?;

        config.validate()?;
        info!(target: TARGET_CLUSTER, "Loaded cluster configuration: {:?}", config);
        Ok(config)
    }

    /// Rejects any configuration that would change scoring behaviour in surprising ways.
    pub fn validate(&self) -> Result<()> {
        let m = &self.matcher;
        for (name, weight) in [
            ("entity_weight", m.entity_weight),
            ("title_weight", m.title_weight),
            ("recency_weight", m.recency_weight),
        ] {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return invalid(format!("matcher.{} must be within [0, 1], got {}", name, weight));
            }
        }
        let sum = m.entity_weight + m.title_weight + m.recency_weight;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return invalid(format!("matcher weights must sum to 1, got {:.6}", sum));
        }
        if !m.threshold.is_finite() || m.threshold <= 0.0 || m.threshold > 1.0 {
            return invalid(format!("matcher.threshold must be within (0, 1], got {}", m.threshold));
        }
        check_hours("matcher.lookback_hours", m.lookback_hours)?;

        let s = &self.scoring;
        for (name, weight) in [
            ("source_weight", s.source_weight),
            ("tier1_weight", s.tier1_weight),
            ("velocity_weight", s.velocity_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return invalid(format!("scoring.{} must be a non-negative number", name));
            }
        }
        if s.source_cap <= 0 || s.tier1_cap <= 0 {
            return invalid("scoring caps must be positive".to_string());
        }
        if s.velocity_window_minutes <= 0 || s.velocity_window_minutes > MAX_WINDOW_HOURS * 60 {
            return invalid(format!(
                "scoring.velocity_window_minutes must be within 1..={}, got {}",
                MAX_WINDOW_HOURS * 60,
                s.velocity_window_minutes
            ));
        }
        check_hours("scoring.staleness_hours", s.staleness_hours)?;
        check_hours("scoring.sweep_horizon_hours", s.sweep_horizon_hours)?;
        if !s.decay_half_life_hours.is_finite()
            || s.decay_half_life_hours <= 0.0
            || s.decay_half_life_hours > MAX_WINDOW_HOURS as f64
        {
            return invalid(format!(
                "scoring.decay_half_life_hours must be within (0, {}], got {}",
                MAX_WINDOW_HOURS, s.decay_half_life_hours
            ));
        }
        if s.spike_min_items == 0 {
            return invalid("scoring.spike_min_items must be at least 1".to_string());
        }
        if !(0.0..1.0).contains(&s.flat_tolerance) {
            return invalid(format!(
                "scoring.flat_tolerance must be within [0, 1), got {}",
                s.flat_tolerance
            ));
        }
        if s.sweep_horizon_hours < s.staleness_hours {
            return invalid("scoring.sweep_horizon_hours must not be shorter than the staleness window".to_string());
        }

        let sel = &self.selection;
        check_hours("selection.freshness_hours", sel.freshness_hours)?;
        if !(0..=100).contains(&sel.min_dis) {
            return invalid(format!("selection.min_dis must be within 0..=100, got {}", sel.min_dis));
        }
        if sel.default_limit == 0 {
            return invalid("selection.default_limit must be at least 1".to_string());
        }

        let a = &self.assigner;
        for (name, value) in [
            ("lock_timeout_ms", a.lock_timeout_ms),
            ("assign_timeout_ms", a.assign_timeout_ms),
            ("retry_base_delay_ms", a.retry_base_delay_ms),
        ] {
            if value == 0 || value > MAX_TIMEOUT_MS {
                return invalid(format!(
                    "assigner.{} must be within 1..={}, got {}",
                    name, MAX_TIMEOUT_MS, value
                ));
            }
        }
        if a.max_attempts == 0 || a.batch_size == 0 {
            return invalid("assigner.max_attempts and assigner.batch_size must be at least 1".to_string());
        }

        Ok(())
    }
}

fn invalid(message: String) -> Result<()> {
    Err(ClusterError::Configuration(message))
}

// Bounded so date arithmetic on any real timestamp cannot overflow
fn check_hours(name: &str, hours: i64) -> Result<()> {
    if hours <= 0 || hours > MAX_WINDOW_HOURS {
        return invalid(format!(
            "{} must be within 1..={}, got {}",
            name, MAX_WINDOW_HOURS, hours
        ));
    }
    Ok(())
}
