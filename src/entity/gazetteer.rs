use std::collections::{BTreeSet, HashMap};
use strsim::jaro_winkler;
use tracing::debug;

use super::aliases::{CLUB_AFFIXES, INFLECTION_SUFFIXES, STATIC_GAZETTEER};
use super::normalizer::normalize_phrase;
use super::types::{EntityKind, GazetteerEntry};
use super::TARGET_ENTITY;

/// Minimum Jaro-Winkler similarity for a fuzzy canonical-name lookup
const FUZZY_THRESHOLD: f64 = 0.93;

/// Shortest single-word name that may carry an inflectional suffix
const MIN_INFLECTED_STEM: usize = 5;

#[derive(Debug, Clone)]
struct KnownName {
    canonical: String,
    kind: EntityKind,
}

/// Dictionary of known team, league and player names keyed by folded alias.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    names: HashMap<String, KnownName>,
    max_words: usize,
}

impl Gazetteer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in dictionary from [`STATIC_GAZETTEER`]
    pub fn builtin() -> Self {
        let mut gazetteer = Self::new();
        for (alias, canonical, kind) in STATIC_GAZETTEER {
            gazetteer.insert(alias, canonical, *kind);
        }
        gazetteer
    }

    /// Merges additional entries; later entries override earlier ones for the same alias.
    pub fn with_entries<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = GazetteerEntry>,
    {
        for entry in entries {
            self.insert(&entry.alias, &entry.canonical, entry.kind);
        }
        self
    }

    pub fn insert(&mut self, alias: &str, canonical: &str, kind: EntityKind) {
        let alias = normalize_phrase(alias);
        let canonical = normalize_phrase(canonical);
        if alias.is_empty() || canonical.is_empty() {
            return;
        }
        self.max_words = self.max_words.max(alias.split(' ').count());
        self.names.insert(alias, KnownName { canonical, kind });
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Kind of a canonical name, if any alias points at it
    pub fn kind_of(&self, canonical: &str) -> Option<EntityKind> {
        self.names
            .values()
            .find(|known| known.canonical == canonical)
            .map(|known| known.kind)
    }

    /// Finds every known name in a token stream, longest phrase first.
    pub fn extract(&self, tokens: &[String]) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut i = 0;

        'outer: while i < tokens.len() {
            let longest = self.max_words.min(tokens.len() - i);
            for n in (1..=longest).rev() {
                let phrase = tokens[i..i + n].join(" ");
                if let Some(known) = self.names.get(&phrase) {
                    found.insert(known.canonical.clone());
                    i += n;
                    continue 'outer;
                }
            }

            if let Some(known) = self.lookup_inflected(&tokens[i]) {
                debug!(
                    target: TARGET_ENTITY,
                    "Matched inflected form '{}' to '{}'", tokens[i], known.canonical
                );
                found.insert(known.canonical.clone());
            }
            i += 1;
        }

        found
    }

    /// Canonical form of a supplied entity name; unknown names come back folded.
    pub fn canonicalize(&self, name: &str) -> Option<String> {
        let phrase = normalize_phrase(name);
        if phrase.is_empty() {
            return None;
        }

        if let Some(known) = self.names.get(&phrase) {
            return Some(known.canonical.clone());
        }

        let stripped = strip_club_affixes(&phrase);
        if stripped != phrase {
            if let Some(known) = self.names.get(&stripped) {
                return Some(known.canonical.clone());
            }
        }

        if let Some(known) = self.lookup_fuzzy(&stripped) {
            debug!(
                target: TARGET_ENTITY,
                "Fuzzy matched '{}' to '{}'", name, known.canonical
            );
            return Some(known.canonical.clone());
        }

        Some(phrase)
    }

    fn lookup_inflected(&self, token: &str) -> Option<&KnownName> {
        for suffix in INFLECTION_SUFFIXES {
            let Some(stem) = token.strip_suffix(suffix) else {
                continue;
            };
            if stem.chars().count() < MIN_INFLECTED_STEM {
                continue;
            }
            if let Some(known) = self.names.get(stem) {
                return Some(known);
            }
        }
        None
    }

    fn lookup_fuzzy(&self, phrase: &str) -> Option<&KnownName> {
        let mut best: Option<(&str, f64)> = None;
        for alias in self.names.keys() {
            let score = jaro_winkler(phrase, alias);
            if score < FUZZY_THRESHOLD {
                continue;
            }
            // Highest score wins, ties go to the lexicographically smaller alias
            let better = match best {
                None => true,
                Some((best_alias, best_score)) => {
                    score > best_score || (score == best_score && alias.as_str() < best_alias)
                }
            };
            if better {
                best = Some((alias.as_str(), score));
            }
        }
        best.and_then(|(alias, _)| self.names.get(alias))
    }
}

fn strip_club_affixes(phrase: &str) -> String {
    phrase
        .split(' ')
        .filter(|word| !CLUB_AFFIXES.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::normalizer::title_tokens;

    fn extract(text: &str) -> BTreeSet<String> {
        Gazetteer::builtin().extract(&title_tokens(text))
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_multi_word_names_first() {
        assert_eq!(
            extract("Manchester City i Real Madrid u Ligi prvaka"),
            set(&["manchester city", "real madrid"])
        );
        assert_eq!(extract("Liga prvaka: Dinamo Zagreb"), set(&["champions league", "dinamo zagreb"]));
    }

    #[test]
    fn test_extract_folds_diacritics_and_aliases() {
        assert_eq!(extract("Barça i Crvena Zvezda"), set(&["barcelona", "crvena zvezda"]));
        assert_eq!(extract("Црвена звезда победила"), set(&["crvena zvezda"]));
    }

    #[test]
    fn test_extract_inflected_forms() {
        assert_eq!(extract("iz Arsenalove perspektive"), set(&["arsenal"]));
        assert_eq!(extract("bez Modrića"), set(&["luka modric"]));
        // stems shorter than five characters never inflect
        assert!(extract("Juvea").is_empty());
    }

    #[test]
    fn test_canonicalize() {
        let gazetteer = Gazetteer::builtin();
        assert_eq!(gazetteer.canonicalize("Man Utd").as_deref(), Some("manchester united"));
        assert_eq!(gazetteer.canonicalize("NK Osijek").as_deref(), Some("osijek"));
        assert_eq!(gazetteer.canonicalize("Tottenham Hotspurs").as_deref(), Some("tottenham hotspur"));
        assert_eq!(gazetteer.canonicalize("Nepoznati klub").as_deref(), Some("nepoznati klub"));
        assert_eq!(gazetteer.canonicalize("  !! "), None);
    }

    #[test]
    fn test_store_entries_extend_builtin() {
        let gazetteer = Gazetteer::builtin().with_entries(vec![GazetteerEntry::new(
            "Varaždin",
            "NK Varaždin",
            EntityKind::Team,
        )]);
        assert_eq!(
            gazetteer.extract(&title_tokens("Varaždin slavi")),
            set(&["nk varazdin"])
        );
        assert_eq!(gazetteer.kind_of("nk varazdin"), Some(EntityKind::Team));
    }
}
