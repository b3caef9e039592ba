use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of named subject the gazetteer knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Team,
    League,
    Player,
    Other,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Team => write!(f, "TEAM"),
            EntityKind::League => write!(f, "LEAGUE"),
            EntityKind::Player => write!(f, "PLAYER"),
            EntityKind::Other => write!(f, "OTHER"),
        }
    }
}

impl From<&str> for EntityKind {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "TEAM" => EntityKind::Team,
            "LEAGUE" => EntityKind::League,
            "PLAYER" => EntityKind::Player,
            _ => EntityKind::Other,
        }
    }
}

/// One alias → canonical name mapping.
///
/// Entries without a site apply to every tenant; a site's own entry for the same alias
/// wins for that site only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazetteerEntry {
    pub alias: String,
    pub canonical: String,
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
}

impl GazetteerEntry {
    pub fn new(alias: &str, canonical: &str, kind: EntityKind) -> Self {
        GazetteerEntry {
            alias: alias.to_string(),
            canonical: canonical.to_string(),
            kind,
            site_id: None,
        }
    }

    pub fn for_site(mut self, site_id: &str) -> Self {
        self.site_id = Some(site_id.to_string());
        self
    }
}
