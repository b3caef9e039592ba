//! Built-in gazetteer
//!
//! Static alias → canonical mappings for the teams, competitions and players the
//! newsrooms cover most. The `gazetteer_entries` table extends it when the engine
//! starts: entries without a site apply to every tenant, entries with one only to that
//! tenant.

use super::types::EntityKind;
use super::types::EntityKind::{League, Player, Team};

/// Club abbreviations that are stripped when canonicalising supplied entity names
pub const CLUB_AFFIXES: &[&str] = &["fc", "cf", "afc", "fk", "nk", "sk", "hnk", "gnk", "kk"];

/// Inflectional endings accepted after a single-word name (Croatian, Serbian, Bosnian,
/// Slovenian declension). Longest first so the most specific stem is tried first.
pub const INFLECTION_SUFFIXES: &[&str] = &[
    "ove", "ovi", "ova", "ina", "ine", "jem", "om", "ov", "ja", "ju", "in", "a", "u", "e", "i",
];

// (alias, canonical, kind); names are written pre-folded
pub const STATIC_GAZETTEER: &[(&str, &str, EntityKind)] = &[
    // England
    ("arsenal", "arsenal", Team),
    ("gunners", "arsenal", Team),
    ("topnicari", "arsenal", Team),
    ("chelsea", "chelsea", Team),
    ("liverpool", "liverpool", Team),
    ("manchester united", "manchester united", Team),
    ("man utd", "manchester united", Team),
    ("man united", "manchester united", Team),
    ("manchester city", "manchester city", Team),
    ("man city", "manchester city", Team),
    ("tottenham", "tottenham hotspur", Team),
    ("tottenham hotspur", "tottenham hotspur", Team),
    ("spurs", "tottenham hotspur", Team),
    ("newcastle", "newcastle united", Team),
    ("newcastle united", "newcastle united", Team),
    // Spain
    ("barcelona", "barcelona", Team),
    ("barca", "barcelona", Team),
    ("real madrid", "real madrid", Team),
    ("atletico madrid", "atletico madrid", Team),
    ("atletico", "atletico madrid", Team),
    // Italy
    ("juventus", "juventus", Team),
    ("juve", "juventus", Team),
    ("inter", "inter", Team),
    ("internazionale", "inter", Team),
    ("ac milan", "milan", Team),
    ("milan", "milan", Team),
    ("napoli", "napoli", Team),
    // Germany, France
    ("bayern", "bayern munchen", Team),
    ("bayern munich", "bayern munchen", Team),
    ("bayern munchen", "bayern munchen", Team),
    ("borussia dortmund", "borussia dortmund", Team),
    ("dortmund", "borussia dortmund", Team),
    ("bvb", "borussia dortmund", Team),
    ("psg", "paris saint-germain", Team),
    ("paris saint-germain", "paris saint-germain", Team),
    // Region
    ("dinamo zagreb", "dinamo zagreb", Team),
    ("dinamo", "dinamo zagreb", Team),
    ("hajduk", "hajduk split", Team),
    ("hajduk split", "hajduk split", Team),
    ("rijeka", "rijeka", Team),
    ("osijek", "osijek", Team),
    ("crvena zvezda", "crvena zvezda", Team),
    ("zvezda", "crvena zvezda", Team),
    ("red star belgrade", "crvena zvezda", Team),
    ("partizan", "partizan", Team),
    ("zeljeznicar", "zeljeznicar", Team),
    ("sarajevo", "sarajevo", Team),
    ("borac banja luka", "borac banja luka", Team),
    ("olimpija ljubljana", "olimpija ljubljana", Team),
    ("maribor", "maribor", Team),
    // Competitions
    ("premier league", "premier league", League),
    ("la liga", "la liga", League),
    ("serie a", "serie a", League),
    ("bundesliga", "bundesliga", League),
    ("ligue 1", "ligue 1", League),
    ("champions league", "champions league", League),
    ("liga prvaka", "champions league", League),
    ("liga sampiona", "champions league", League),
    ("europa league", "europa league", League),
    ("europska liga", "europa league", League),
    ("konferencijska liga", "conference league", League),
    ("conference league", "conference league", League),
    ("hnl", "hnl", League),
    ("supersport hnl", "hnl", League),
    ("superliga", "superliga srbije", League),
    ("premijer liga bih", "premijer liga bih", League),
    ("world cup", "svjetsko prvenstvo", League),
    ("svjetsko prvenstvo", "svjetsko prvenstvo", League),
    ("euroleague", "euroleague", League),
    ("euroliga", "euroleague", League),
    ("aba liga", "aba liga", League),
    ("nba", "nba", League),
    // Players
    ("luka modric", "luka modric", Player),
    ("modric", "luka modric", Player),
    ("mateo kovacic", "mateo kovacic", Player),
    ("kovacic", "mateo kovacic", Player),
    ("josko gvardiol", "josko gvardiol", Player),
    ("gvardiol", "josko gvardiol", Player),
    ("ivan perisic", "ivan perisic", Player),
    ("perisic", "ivan perisic", Player),
    ("dusan vlahovic", "dusan vlahovic", Player),
    ("vlahovic", "dusan vlahovic", Player),
    ("edin dzeko", "edin dzeko", Player),
    ("dzeko", "edin dzeko", Player),
    ("bukayo saka", "bukayo saka", Player),
    ("erling haaland", "erling haaland", Player),
    ("haaland", "erling haaland", Player),
    ("kylian mbappe", "kylian mbappe", Player),
    ("mbappe", "kylian mbappe", Player),
    ("lionel messi", "lionel messi", Player),
    ("messi", "lionel messi", Player),
    ("novak djokovic", "novak djokovic", Player),
    ("djokovic", "novak djokovic", Player),
    ("nikola jokic", "nikola jokic", Player),
    ("jokic", "nikola jokic", Player),
];
