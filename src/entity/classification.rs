//! Keyword classification of event type and sports category
//!
//! Patterns run over folded text (see [`fold_text`]), so they are written lowercase and
//! without diacritics. The first matching pattern wins; order encodes priority.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::normalizer::fold_text;
use crate::error::ClusterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    MatchResult,
    Transfer,
    Injury,
    Suspension,
    CoachChange,
    Preview,
    Contract,
    General,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::MatchResult => "match-result",
            EventType::Transfer => "transfer",
            EventType::Injury => "injury",
            EventType::Suspension => "suspension",
            EventType::CoachChange => "coach-change",
            EventType::Preview => "preview",
            EventType::Contract => "contract",
            EventType::General => "general",
        }
    }

    pub fn is_specific(&self) -> bool {
        *self != EventType::General
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "match-result" => Ok(EventType::MatchResult),
            "transfer" => Ok(EventType::Transfer),
            "injury" => Ok(EventType::Injury),
            "suspension" => Ok(EventType::Suspension),
            "coach-change" => Ok(EventType::CoachChange),
            "preview" => Ok(EventType::Preview),
            "contract" => Ok(EventType::Contract),
            "general" => Ok(EventType::General),
            other => Err(ClusterError::InvalidRecord(format!("unknown event type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Football,
    Basketball,
    Tennis,
    Handball,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Football => "football",
            Category::Basketball => "basketball",
            Category::Tennis => "tennis",
            Category::Handball => "handball",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "football" => Ok(Category::Football),
            "basketball" => Ok(Category::Basketball),
            "tennis" => Ok(Category::Tennis),
            "handball" => Ok(Category::Handball),
            "other" => Ok(Category::Other),
            other => Err(ClusterError::InvalidRecord(format!("unknown category '{}'", other))),
        }
    }
}

lazy_static! {
    static ref EVENT_PATTERNS: Vec<(EventType, Regex)> = vec![
        (
            EventType::Injury,
            Regex::new(r"\b(injur\w*|ozljed\w*|ozlijed\w*|povred\w*|povrijed\w*|sidelined|hamstring|out for \w+ weeks)\b").unwrap(),
        ),
        (
            EventType::Suspension,
            Regex::new(r"\b(suspen\w*|kazn\w*|red card|crveni karton|banned|ban)\b").unwrap(),
        ),
        (
            EventType::CoachChange,
            Regex::new(r"\b(sacked|fired|appoint\w*|new (?:head )?coach|new manager|smijenjen\w*|smenjen\w*|dobio otkaz|novi trener\w*|preuzima klupu)\b").unwrap(),
        ),
        (
            EventType::Transfer,
            Regex::new(r"\b(transfer\w*|signs?|signed|signing|loan(?:ed)?|posudb\w*|pojacanj\w*|prelaz\w*|dovodi|rumou?rs?|bid|ponud\w*)\b").unwrap(),
        ),
        (
            EventType::Contract,
            Regex::new(r"\b(contract\w*|ugovor\w*|extension|produzio|produljio)\b").unwrap(),
        ),
        (
            EventType::MatchResult,
            Regex::new(r"(\b\d{1,2}\s?[-:]\s?\d{1,2}\b|\b(wins?|won|beat(?:s|en)?|defeat\w*|draw|remi|pobjed\w*|pobijed\w*|pobed\w*|poraz\w*|slavi\w*|zavrsen\w*|rezultat\w*)\b)").unwrap(),
        ),
        (
            EventType::Preview,
            Regex::new(r"\b(preview|najava|ahead of|uoci|line-?ups?|predicted|prognoz\w*|kickoff)\b").unwrap(),
        ),
    ];

    static ref CATEGORY_PATTERNS: Vec<(Category, Regex)> = vec![
        (
            Category::Handball,
            Regex::new(r"\b(handball|rukomet\w*|ehf)\b").unwrap(),
        ),
        (
            Category::Tennis,
            Regex::new(r"\b(tennis|tenis\w*|atp|wta|grand slam|wimbledon|roland garros|djokovic)\b").unwrap(),
        ),
        (
            Category::Basketball,
            Regex::new(r"\b(basketball|kosark\w*|nba|euroleague|euroliga|aba liga|jokic)\b").unwrap(),
        ),
        (
            Category::Football,
            Regex::new(r"\b(football|soccer|nogomet\w*|fudbal\w*|goal\w*|gol|golov\w*|penal\w*|liga|league|derbi\w*|derby|striker|napadac\w*|vratar\w*|goalkeeper|hnl|premier league|arsenal|chelsea|barcelona|hajduk|dinamo|zvezd\w*|partizan)\b").unwrap(),
        ),
    ];
}

/// Event type of already folded text.
pub fn classify_event_folded(folded: &str) -> EventType {
    EVENT_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(folded))
        .map(|(event_type, _)| *event_type)
        .unwrap_or(EventType::General)
}

/// Event type of a raw headline and body.
pub fn classify_event(title: &str, content: &str) -> EventType {
    // The headline decides when it is specific; the body only breaks a tie with General
    let from_title = classify_event_folded(&fold_text(title));
    if from_title.is_specific() {
        return from_title;
    }
    classify_event_folded(&fold_text(content))
}

/// Category of already folded text.
pub fn classify_category_folded(folded: &str) -> Category {
    CATEGORY_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(folded))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

/// Category of raw text; the keyword fallback used when a cluster has none stored.
pub fn derive_category(text: &str) -> Category {
    classify_category_folded(&fold_text(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_results() {
        assert_eq!(classify_event("Arsenal pobjeđuje Chelsea 2-1", ""), EventType::MatchResult);
        assert_eq!(classify_event("Hajduk - Rijeka 1:1", ""), EventType::MatchResult);
        assert_eq!(classify_event("Dinamo slavio u derbiju", ""), EventType::MatchResult);
    }

    #[test]
    fn test_specific_event_types() {
        assert_eq!(classify_event("Barcelona transfer rumor", ""), EventType::Transfer);
        assert_eq!(classify_event("Modrić ozlijeđen, propušta derbi", ""), EventType::Injury);
        assert_eq!(classify_event("Trener smijenjen nakon poraza", ""), EventType::CoachChange);
        assert_eq!(classify_event("Gvardiol produžio ugovor", ""), EventType::Contract);
        assert_eq!(classify_event("Najava kola: Osijek protiv Rijeke", ""), EventType::Preview);
    }

    #[test]
    fn test_body_used_when_title_is_general() {
        assert_eq!(
            classify_event("Veliki dan za Zvezdu", "<p>Klub je potvrdio transfer napadača.</p>"),
            EventType::Transfer
        );
        assert_eq!(classify_event("Veliki dan", "Nema novosti."), EventType::General);
    }

    #[test]
    fn test_categories() {
        assert_eq!(derive_category("Rukometaši u finalu EHF lige"), Category::Handball);
        assert_eq!(derive_category("Đoković osvojio Wimbledon"), Category::Tennis);
        assert_eq!(derive_category("Jokić triple-double u NBA"), Category::Basketball);
        assert_eq!(derive_category("Arsenal pobjeđuje Chelsea"), Category::Football);
        assert_eq!(derive_category("Izbori u gradu"), Category::Other);
    }

    #[test]
    fn test_round_trip_names() {
        assert_eq!("coach-change".parse::<EventType>().unwrap(), EventType::CoachChange);
        assert_eq!("Football".parse::<Category>().unwrap(), Category::Football);
        assert!("cricket".parse::<Category>().is_err());
    }
}
