use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::Arc;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::gazetteer::Gazetteer;

lazy_static! {
    static ref SCRIPT_STYLE: Regex =
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>").unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref CHAR_REF: Regex =
        Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z][a-zA-Z0-9]{1,31});").unwrap();
    static ref POSSESSIVE: Regex = Regex::new(r"['’]s\b").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Output of [`TextNormalizer::normalize`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedText {
    /// Title tokens followed by content tokens
    pub tokens: Vec<String>,
    /// Canonical names of every gazetteer entry found in the text
    pub entities: BTreeSet<String>,
    title_len: usize,
}

impl NormalizedText {
    pub fn title_tokens(&self) -> &[String] {
        &self.tokens[..self.title_len]
    }

    /// Nothing to compare against an existing cluster
    pub fn is_unmatchable(&self) -> bool {
        self.tokens.is_empty() && self.entities.is_empty()
    }
}

/// Turns raw feed text into tokens and gazetteer entities. Pure and deterministic.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    gazetteer: Arc<Gazetteer>,
}

impl TextNormalizer {
    pub fn new(gazetteer: Arc<Gazetteer>) -> Self {
        Self { gazetteer }
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    pub fn normalize(&self, raw_title: &str, raw_content: &str) -> NormalizedText {
        let title_tokens = tokenize(&fold_text(raw_title));
        let content_tokens = tokenize(&fold_text(raw_content));

        // Extract separately so no n-gram spans the title/content boundary
        let mut entities = self.gazetteer.extract(&title_tokens);
        entities.extend(self.gazetteer.extract(&content_tokens));

        let title_len = title_tokens.len();
        let mut tokens = title_tokens;
        tokens.extend(content_tokens);

        NormalizedText {
            tokens,
            entities,
            title_len,
        }
    }

    /// Union of the fetcher-supplied entity names (canonicalised) and extracted entities.
    pub fn resolve_entities(
        &self,
        supplied: &BTreeSet<String>,
        extracted: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        supplied
            .iter()
            .filter_map(|name| self.gazetteer.canonicalize(name))
            .chain(extracted.iter().cloned())
            .collect()
    }
}

/// Removes markup and decodes character references, leaving single-spaced prose.
pub fn strip_markup(raw: &str) -> String {
    let without_blocks = SCRIPT_STYLE.replace_all(raw, " ");
    let without_comments = COMMENT.replace_all(&without_blocks, " ");
    let without_tags = TAG.replace_all(&without_comments, " ");
    let decoded = decode_entities(&without_tags);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Decodes named and numeric character references; unknown names are left untouched.
pub fn decode_entities(text: &str) -> String {
    CHAR_REF
        .replace_all(text, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body
                .strip_prefix("#x")
                .or_else(|| body.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "laquo" => '«',
        "raquo" => '»',
        "bdquo" => '„',
        "ldquo" => '“',
        "rdquo" => '”',
        "lsquo" => '‘',
        "rsquo" => '’',
        "scaron" => 'š',
        "Scaron" => 'Š',
        "zcaron" => 'ž',
        "Zcaron" => 'Ž',
        "ccaron" => 'č',
        "Ccaron" => 'Č',
        "cacute" => 'ć',
        "Cacute" => 'Ć',
        "dstrok" => 'đ',
        "Dstrok" => 'Đ',
        "eacute" => 'é',
        "uuml" => 'ü',
        "ouml" => 'ö',
        "auml" => 'ä',
        _ => return None,
    };
    Some(c)
}

/// Lowercases, transliterates Serbian Cyrillic and strips diacritics (`č ć š ž đ`).
pub fn fold_diacritics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        match c {
            'đ' => out.push('d'),
            'ø' => out.push('o'),
            'ł' => out.push('l'),
            'ß' => out.push_str("ss"),
            'æ' => out.push_str("ae"),
            'а'..='я' | 'ђ' | 'ј' | 'љ' | 'њ' | 'ћ' | 'џ' => out.push_str(transliterate(c)),
            _ => out.extend(c.nfkd().filter(|m| !is_combining_mark(*m))),
        }
    }
    out
}

fn transliterate(c: char) -> &'static str {
    match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'ђ' => "d",
        'е' => "e",
        'ж' => "z",
        'з' => "z",
        'и' => "i",
        'ј' => "j",
        'к' => "k",
        'л' => "l",
        'љ' => "lj",
        'м' => "m",
        'н' => "n",
        'њ' => "nj",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'ћ' => "c",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "c",
        'ч' => "c",
        'џ' => "dz",
        'ш' => "s",
        'й' => "j",
        'щ' => "sc",
        'ы' => "y",
        'э' => "e",
        'ю' => "ju",
        'я' => "ja",
        _ => "",
    }
}

/// Markup-free, lowercased, diacritic-folded text with possessive `'s` removed.
pub fn fold_text(raw: &str) -> String {
    let folded = fold_diacritics(&strip_markup(raw));
    POSSESSIVE.replace_all(&folded, "").into_owned()
}

/// Splits folded text into tokens. Punctuation separates tokens, except a hyphen between
/// two word characters (`2-1`, `saint-germain`).
pub fn tokenize(folded: &str) -> Vec<String> {
    fn flush(current: &mut String, tokens: &mut Vec<String>) {
        let token = current.trim_end_matches('-');
        if !token.is_empty() {
            tokens.push(token.to_string());
        }
        current.clear();
    }

    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in folded.chars() {
        if c.is_alphanumeric() {
            current.push(c);
        } else if c == '-' && !current.is_empty() && !current.ends_with('-') {
            current.push(c);
        } else {
            flush(&mut current, &mut tokens);
        }
    }
    flush(&mut current, &mut tokens);

    tokens
}

/// Tokens of a headline, as compared by the matcher.
pub fn title_tokens(raw_title: &str) -> Vec<String> {
    tokenize(&fold_text(raw_title))
}

/// Canonical spelling of a multi-word name: folded tokens joined by single spaces.
pub fn normalize_phrase(name: &str) -> String {
    title_tokens(name).join(" ")
}
