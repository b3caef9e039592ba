use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::entity::{Category, EventType};
use crate::error::ClusterError;

pub type ItemId = i64;
pub type ClusterId = i64;

/// Tier assumed for feed records that do not carry one
pub const DEFAULT_SOURCE_TIER: i32 = 2;

fn default_source_tier() -> i32 {
    DEFAULT_SOURCE_TIER
}

/// A feed record as handed over by the fetcher, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub site_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub source: String,
    #[serde(default = "default_source_tier")]
    pub source_tier: i32,
    #[serde(default)]
    pub url: String,
    pub pub_date: DateTime<Utc>,
    /// Entity names supplied by the fetcher, in any spelling
    #[serde(default)]
    pub entities: Vec<String>,
}

/// One stored news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: ItemId,
    pub site_id: String,
    pub title: String,
    pub content: String,
    pub source: String,
    pub source_tier: i32,
    pub url: String,
    pub pub_date: DateTime<Utc>,
    pub entities: BTreeSet<String>,
    /// Set exactly once, by the assigner
    pub cluster_id: Option<ClusterId>,
    /// Match score against the cluster it joined; `None` for founding members
    pub similarity: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn is_assigned(&self) -> bool {
        self.cluster_id.is_some()
    }

    pub fn is_tier1(&self) -> bool {
        self.source_tier == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Spiking,
    Rising,
    Steady,
    Cooling,
    Fading,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Spiking => "SPIKING",
            Trend::Rising => "RISING",
            Trend::Steady => "STEADY",
            Trend::Cooling => "COOLING",
            Trend::Fading => "FADING",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trend {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SPIKING" => Ok(Trend::Spiking),
            "RISING" => Ok(Trend::Rising),
            "STEADY" => Ok(Trend::Steady),
            "COOLING" => Ok(Trend::Cooling),
            "FADING" => Ok(Trend::Fading),
            other => Err(ClusterError::InvalidRecord(format!("unknown trend '{}'", other))),
        }
    }
}

/// A set of news items believed to report the same event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryCluster {
    pub id: ClusterId,
    pub site_id: String,
    /// Representative headline
    pub title: String,
    /// Source tier of the item the headline was taken from
    pub title_tier: i32,
    pub event_type: EventType,
    pub category: Option<Category>,
    pub entities: BTreeSet<String>,
    pub dis: i32,
    pub trend: Trend,
    /// Items per hour over the most recent velocity window
    pub velocity: f64,
    pub source_count: i32,
    pub tier1_count: i32,
    pub item_count: i32,
    pub first_seen: DateTime<Utc>,
    pub latest_item: DateTime<Utc>,
    pub scored_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Output of the scoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterScore {
    pub dis: i32,
    pub trend: Trend,
    pub velocity: f64,
    pub scored_at: DateTime<Utc>,
}

/// Every derived cluster field, recomputed from the full member list on each change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMeta {
    pub title: String,
    pub title_tier: i32,
    pub event_type: EventType,
    pub category: Option<Category>,
    pub entities: BTreeSet<String>,
    pub source_count: i32,
    pub tier1_count: i32,
    pub item_count: i32,
    pub first_seen: DateTime<Utc>,
    pub latest_item: DateTime<Utc>,
    pub score: ClusterScore,
}

/// The membership write for one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub item_id: ItemId,
    pub site_id: String,
    /// Resolved entity set, persisted on the item
    pub entities: BTreeSet<String>,
    pub similarity: Option<f64>,
    pub assigned_at: DateTime<Utc>,
}

/// What a single assignment did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AssignOutcome {
    Created { cluster_id: ClusterId },
    Joined { cluster_id: ClusterId, score: f64 },
    AlreadyAssigned { cluster_id: ClusterId },
}

impl AssignOutcome {
    pub fn cluster_id(&self) -> ClusterId {
        match self {
            AssignOutcome::Created { cluster_id }
            | AssignOutcome::Joined { cluster_id, .. }
            | AssignOutcome::AlreadyAssigned { cluster_id } => *cluster_id,
        }
    }
}

/// Result of one `assign_pending` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub assigned_existing: usize,
    pub created: usize,
    pub already_assigned: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: &AssignOutcome) {
        match outcome {
            AssignOutcome::Created { .. } => self.created += 1,
            AssignOutcome::Joined { .. } => self.assigned_existing += 1,
            AssignOutcome::AlreadyAssigned { .. } => self.already_assigned += 1,
        }
    }

    pub fn merge(&mut self, other: &BatchReport) {
        self.assigned_existing += other.assigned_existing;
        self.created += other.created;
        self.already_assigned += other.already_assigned;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }

    pub fn processed(&self) -> usize {
        self.assigned_existing + self.created + self.already_assigned + self.skipped + self.failed
    }
}

/// Result of one decay sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub examined: usize,
    pub updated: usize,
    /// Clusters left with their previous score after an error
    pub failed: usize,
}

/// Dashboard listing filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterFilter {
    pub site_id: String,
    pub event_type: Option<EventType>,
    pub min_dis: Option<i32>,
    /// Lower bound on `latest_item`, inclusive
    pub since: Option<DateTime<Utc>>,
    /// Upper bound on `latest_item`, inclusive
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ClusterFilter {
    pub fn for_site(site_id: &str) -> Self {
        ClusterFilter {
            site_id: site_id.to_string(),
            ..Default::default()
        }
    }
}

/// A member item as shown next to a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnippet {
    pub id: ItemId,
    pub title: String,
    pub source: String,
    pub source_tier: i32,
    pub url: String,
    pub pub_date: DateTime<Utc>,
}

impl From<&NewsItem> for ItemSnippet {
    fn from(item: &NewsItem) -> Self {
        ItemSnippet {
            id: item.id,
            title: item.title.clone(),
            source: item.source.clone(),
            source_tier: item.source_tier,
            url: item.url.clone(),
            pub_date: item.pub_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopStory {
    #[serde(flatten)]
    pub cluster: StoryCluster,
    pub supporting_items: Vec<ItemSnippet>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDetail {
    #[serde(flatten)]
    pub cluster: StoryCluster,
    pub items: Vec<ItemSnippet>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_defaults_from_json() {
        let item: NewItem = serde_json::from_str(
            r#"{"siteId":"s1","title":"Arsenal slavi","source":"sport.hr","pubDate":"2024-03-01T18:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(item.source_tier, DEFAULT_SOURCE_TIER);
        assert!(item.content.is_empty());
        assert!(item.entities.is_empty());
    }

    #[test]
    fn trend_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Trend::Spiking).unwrap(), "\"SPIKING\"");
        assert_eq!("fading".parse::<Trend>().unwrap(), Trend::Fading);
        assert!("HOT".parse::<Trend>().is_err());
    }

    #[test]
    fn batch_report_counts() {
        let mut report = BatchReport::default();
        report.record(&AssignOutcome::Created { cluster_id: 1 });
        report.record(&AssignOutcome::Joined { cluster_id: 1, score: 0.8 });
        report.skipped += 1;

        let mut total = BatchReport::default();
        total.merge(&report);
        total.merge(&report);
        assert_eq!(total.created, 2);
        assert_eq!(total.assigned_existing, 2);
        assert_eq!(total.processed(), 6);
    }
}
