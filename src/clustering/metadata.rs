use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};

use super::significance::{score_timeline, Timeline};
use super::types::{ClusterMeta, NewsItem};
use crate::config::ScoringConfig;
use crate::entity::classification::{classify_category_folded, classify_event};
use crate::entity::normalizer::fold_text;
use crate::entity::{Category, EventType};
use crate::error::{ClusterError, Result};

/// Recomputes every derived cluster field from the full member list.
///
/// `members` must be in assignment order. The representative headline belongs to the
/// first member with the best (lowest) source tier, so it only changes when a later item
/// is strictly better.
pub fn derive_meta(
    members: &[NewsItem],
    now: DateTime<Utc>,
    cfg: &ScoringConfig,
) -> Result<ClusterMeta> {
    let Some(first) = members.first() else {
        return Err(ClusterError::InvalidRecord(
            "cannot derive cluster fields without members".to_string(),
        ));
    };

    let mut representative = first;
    for item in &members[1..] {
        if item.source_tier < representative.source_tier {
            representative = item;
        }
    }

    let sources: HashSet<&str> = members.iter().map(|m| m.source.as_str()).collect();
    let tier1_count = members.iter().filter(|m| m.is_tier1()).count();
    let entities: BTreeSet<String> = members
        .iter()
        .flat_map(|m| m.entities.iter().cloned())
        .collect();

    let pub_dates: Vec<DateTime<Utc>> = members.iter().map(|m| m.pub_date).collect();
    let first_seen = pub_dates.iter().copied().min().unwrap_or(first.pub_date);
    let latest_item = pub_dates.iter().copied().max().unwrap_or(first.pub_date);

    let timeline = Timeline {
        source_count: sources.len(),
        tier1_count,
        latest_item,
        pub_dates,
    };

    Ok(ClusterMeta {
        title: representative.title.clone(),
        title_tier: representative.source_tier,
        event_type: cluster_event_type(members),
        category: cluster_category(members),
        entities,
        source_count: sources.len() as i32,
        tier1_count: tier1_count as i32,
        item_count: members.len() as i32,
        first_seen,
        latest_item,
        score: score_timeline(&timeline, now, cfg),
    })
}

/// The founding item's event type, unless that was General and a later member is specific.
fn cluster_event_type(members: &[NewsItem]) -> EventType {
    let mut types = members.iter().map(|m| classify_event(&m.title, &m.content));
    let founding = types.next().unwrap_or(EventType::General);
    if founding.is_specific() {
        return founding;
    }
    types.find(EventType::is_specific).unwrap_or(EventType::General)
}

fn cluster_category(members: &[NewsItem]) -> Option<Category> {
    members
        .iter()
        .map(|m| classify_category_folded(&fold_text(&format!("{} {}", m.title, m.content))))
        .find(|category| *category != Category::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::Trend;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn item(id: i64, title: &str, source: &str, tier: i32, minutes: i64) -> NewsItem {
        NewsItem {
            id,
            site_id: "s1".to_string(),
            title: title.to_string(),
            content: String::new(),
            source: source.to_string(),
            source_tier: tier,
            url: String::new(),
            pub_date: t0() + Duration::minutes(minutes),
            entities: ["arsenal".to_string()].into(),
            cluster_id: Some(1),
            similarity: None,
            created_at: t0(),
            assigned_at: Some(t0()),
        }
    }

    #[test]
    fn test_counts_and_bounds() {
        let members = vec![
            item(1, "Arsenal pobjeđuje Chelsea 2-1", "index.hr", 1, 0),
            item(2, "Chelsea - Arsenal 1-2", "sportske.net", 2, 5),
            item(3, "Arsenal slavi", "index.hr", 1, -10),
        ];
        let meta = derive_meta(&members, t0() + Duration::minutes(10), &ScoringConfig::default())
            .unwrap();

        assert_eq!(meta.source_count, 2);
        assert_eq!(meta.tier1_count, 2);
        assert_eq!(meta.item_count, 3);
        assert_eq!(meta.first_seen, t0() - Duration::minutes(10));
        assert_eq!(meta.latest_item, t0() + Duration::minutes(5));
        assert_eq!(meta.title, "Arsenal pobjeđuje Chelsea 2-1");
        assert_eq!(meta.event_type, EventType::MatchResult);
        assert_eq!(meta.category, Some(Category::Football));
    }

    #[test]
    fn test_representative_needs_strictly_better_tier() {
        let members = vec![
            item(1, "Prvi naslov", "a", 2, 0),
            item(2, "Drugi naslov", "b", 2, 1),
            item(3, "Treći naslov", "c", 1, 2),
            item(4, "Četvrti naslov", "d", 1, 3),
        ];
        let meta = derive_meta(&members[..2], t0(), &ScoringConfig::default()).unwrap();
        assert_eq!(meta.title, "Prvi naslov");
        assert_eq!(meta.title_tier, 2);

        let meta = derive_meta(&members, t0(), &ScoringConfig::default()).unwrap();
        assert_eq!(meta.title, "Treći naslov");
        assert_eq!(meta.title_tier, 1);
    }

    #[test]
    fn test_general_event_type_is_upgraded() {
        let members = vec![
            item(1, "Veliki dan za Arsenal", "a", 1, 0),
            item(2, "Arsenal transfer potvrđen", "b", 2, 1),
        ];
        let meta = derive_meta(&members, t0(), &ScoringConfig::default()).unwrap();
        assert_eq!(meta.event_type, EventType::Transfer);
    }

    #[test]
    fn test_empty_member_list_is_rejected() {
        assert!(derive_meta(&[], t0(), &ScoringConfig::default()).is_err());
    }

    #[test]
    fn test_score_is_part_of_meta() {
        let members = vec![item(1, "Arsenal slavi", "a", 1, 0)];
        let meta = derive_meta(&members, t0(), &ScoringConfig::default()).unwrap();
        assert_eq!(meta.score.scored_at, t0());
        assert_ne!(meta.score.trend, Trend::Fading);
    }
}
