//! Rendered citation text parsing
//!
//! When a payload cannot be decoded or matched, the visible citation text
//! (`(Smith & Jones, 2019; World Health Organization 2020)`) is the last
//! source of information. Each `;`-separated group becomes a
//! [`DisplayCitation`] with an ordered list of lookup records to try.

use lazy_static::lazy_static;
use regex::Regex;

use crate::normalizer::CitationRecord;

lazy_static! {
    static ref YEAR_RUN: Regex = Regex::new(r"(\d{4})").unwrap();
    static ref ET_AL: Regex = Regex::new(r"(?i)\s*et\s+al\.?\s*$").unwrap();
    // Cross-reference prefixes: German, English, French, Spanish, Italian,
    // Portuguese, Dutch. Bare words must end at a word boundary.
    static ref XREF_PREFIX: Regex = Regex::new(
        r"(?i)^(?:(?:vgl|cfr|cf)\.|(?:see(?:\s+also)?|voir(?:\s+aussi)?|véase|vedi|ver|veja|zie)\b\.?)\s*"
    )
    .unwrap();
    // German "s." / "s. a." (siehe). Lowercase only, so an initial like
    // "S. Müller" is left alone
    static ref SIEHE_PREFIX: Regex = Regex::new(r"^s\.(?:\s*a\.)?\s+").unwrap();
    static ref AUTHOR_SEPARATOR: Regex = Regex::new(r"(?i)\s*&\s*|\s+and\s+|\s*,\s*").unwrap();
    static ref CONNECTORS: Vec<Regex> = ["und", "et", "y", "e", "en"]
        .iter()
        .map(|word| Regex::new(&format!(r"(?i)\s+{}\s+", word)).unwrap())
        .collect();
    static ref TRAILING_INITIAL: Regex = Regex::new(r"\s+[A-Z]\.?\s*$").unwrap();
}

/// Organisation names like "National Institute of Health und Medical
/// Research" are only split on a connector when the left side is short
const MAX_CONNECTOR_SPLIT_WORDS: usize = 2;

/// One parsed citation group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayCitation {
    pub year: String,
    /// Text before the year, without "et al." and cross-reference prefixes
    pub author_portion: String,
    pub primary_author: String,
    /// Family names to try: the full primary author, then its last word
    pub candidates: Vec<String>,
    /// Untruncated author portion, tried as an organisation name
    pub organization_fallback: Option<String>,
    /// Author portion tried as a title
    pub title_fallback: Option<String>,
}

impl DisplayCitation {
    /// Lookup records in the order they should be tried
    pub fn queries(&self) -> Vec<CitationRecord> {
        let by_family = |family: &str| {
            CitationRecord::default()
                .with_author(family, "")
                .with_year(self.year.clone())
        };

        let mut queries: Vec<CitationRecord> =
            self.candidates.iter().map(|c| by_family(c)).collect();
        if let Some(organization) = &self.organization_fallback {
            queries.push(by_family(organization));
        }
        if let Some(title) = &self.title_fallback {
            queries.push(
                CitationRecord::default()
                    .with_title(title.clone())
                    .with_year(self.year.clone()),
            );
        }
        queries
    }

    pub fn descriptor(&self) -> String {
        format!("{}, {}", self.primary_author, self.year)
    }
}

/// Parse rendered citation text into groups. Groups without a year or
/// without an author portion are dropped.
pub fn parse_display_text(text: &str) -> Vec<DisplayCitation> {
    text.trim_matches(|c| matches!(c, '(' | ')' | '[' | ']' | ' '))
        .split(';')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .filter_map(parse_group)
        .collect()
}

/// Drop a leading "s." / "s. a." when a capitalised name follows it
fn strip_siehe(text: &str) -> String {
    if let Some(prefix) = SIEHE_PREFIX.find(text) {
        let rest = &text[prefix.end()..];
        if rest.chars().next().is_some_and(char::is_uppercase) {
            return rest.trim().to_string();
        }
    }
    text.to_string()
}

fn parse_group(group: &str) -> Option<DisplayCitation> {
    let year_match = YEAR_RUN.find(group)?;
    let year = year_match.as_str().to_string();

    let before_year = group[..year_match.start()]
        .trim()
        .trim_end_matches(',')
        .trim();
    let without_et_al = ET_AL.replace(before_year, "");
    let without_et_al = without_et_al.trim();
    if without_et_al.is_empty() {
        return None;
    }
    let author_portion = strip_siehe(XREF_PREFIX.replace(without_et_al, "").trim());

    let mut primary = AUTHOR_SEPARATOR
        .split(&author_portion)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    for connector in CONNECTORS.iter() {
        let head = {
            let mut parts = connector.split(&primary);
            let first = parts.next().unwrap_or_default();
            (parts.next().is_some()
                && first.split_whitespace().count() <= MAX_CONNECTOR_SPLIT_WORDS)
                .then(|| first.trim().to_string())
        };
        if let Some(head) = head {
            primary = head;
            break;
        }
    }
    if primary.is_empty() {
        return None;
    }

    let primary = TRAILING_INITIAL.replace(&primary, "").trim().to_string();
    let words: Vec<&str> = primary.split_whitespace().collect();

    let mut candidates = vec![primary.clone()];
    if words.len() > 1 {
        candidates.push(words[words.len() - 1].to_string());
    }

    let (organization_fallback, title_fallback) = if words.len() > 2 {
        let full = TRAILING_INITIAL.replace(&author_portion, "").trim().to_string();
        let organization = (full != primary).then_some(full);
        (organization, Some(author_portion.clone()))
    } else {
        (None, None)
    };

    Some(DisplayCitation {
        year,
        author_portion,
        primary_author: primary,
        candidates,
        organization_fallback,
        title_fallback,
    })
}
