//! Citavi payload normalization
//!
//! Citavi payloads come in several shapes: a single record, a mapping with the
//! records under a list key, or a bare list. Field names also vary between
//! versions, so every logical field has an ordered alias list and the first
//! present, non-empty scalar wins.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

lazy_static! {
    static ref YEAR_PATTERN: Regex = Regex::new(r"\b(1\d{3}|2\d{3})\b").unwrap();
}

const TITLE_KEYS: &[&str] = &["Title", "title", "TitleString"];
const AUTHOR_KEYS: &[&str] = &["Authors", "authors", "AuthorsOrEditorsOrOrganizations"];
const YEAR_KEYS: &[&str] = &["Year", "year", "YearResolved", "Date"];
const DOI_KEYS: &[&str] = &["Doi", "doi", "DOI"];
const ISBN_KEYS: &[&str] = &["Isbn", "isbn", "ISBN"];
const LIST_KEYS: &[&str] = &["Entries", "entries", "Citations", "citations", "References"];
const FAMILY_KEYS: &[&str] = &["LastName", "Family", "family"];
const GIVEN_KEYS: &[&str] = &["FirstName", "Given", "given"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Author {
    pub family: String,
    pub given: String,
}

impl Author {
    pub fn new(family: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            given: given.into(),
        }
    }

    /// `"Smith, John"` → family/given; no comma → family only
    pub fn from_display(name: &str) -> Self {
        match name.split_once(',') {
            Some((family, given)) => Self::new(family.trim(), given.trim()),
            None => Self::new(name.trim(), ""),
        }
    }

    fn is_blank(&self) -> bool {
        self.family.is_empty() && self.given.is_empty()
    }
}

/// Canonical extraction from a payload or from display text
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
pub struct CitationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Document order; the first entry is the primary author
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

impl CitationRecord {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, family: impl Into<String>, given: impl Into<String>) -> Self {
        self.authors.push(Author::new(family, given));
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn with_doi(mut self, doi: impl Into<String>) -> Self {
        self.doi = Some(doi.into());
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.authors.is_empty()
            && self.year.is_none()
            && self.doi.is_none()
            && self.isbn.is_none()
    }

    /// A year alone can never reach the fuzzy acceptance threshold
    pub fn has_match_signal(&self) -> bool {
        self.title.is_some() || !self.authors.is_empty() || self.doi.is_some() || self.isbn.is_some()
    }

    pub fn primary_family(&self) -> Option<&str> {
        self.authors
            .first()
            .map(|a| a.family.as_str())
            .filter(|f| !f.is_empty())
    }

    /// Memoization key: the record serialized with a fixed field order
    pub fn canonical_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// `"Smith, 2019"` for unmatched reports
    pub fn descriptor(&self) -> String {
        format!(
            "{}, {}",
            self.primary_family().unwrap_or("?"),
            self.year.as_deref().unwrap_or("?")
        )
    }
}

/// Shape of a decoded payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload<'a> {
    Record(&'a Map<String, Value>),
    RecordList(&'a [Value]),
    Unrecognized,
}

/// A mapping with a non-empty list under a known list key is a record list;
/// any other mapping is a record
pub fn classify(value: &Value) -> Payload<'_> {
    match value {
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .filter(|list| !list.is_empty())
            .map_or(Payload::Record(map), |list| Payload::RecordList(list)),
        Value::Array(list) => Payload::RecordList(list),
        _ => Payload::Unrecognized,
    }
}

pub fn normalize(value: &Value) -> Vec<CitationRecord> {
    match classify(value) {
        Payload::RecordList(entries) => records_from(entries),
        Payload::Record(map) => {
            if let Some(record) = extract_record(map) {
                return vec![record];
            }
            // Unknown list key: take the first list that holds records
            map.values()
                .filter_map(Value::as_array)
                .map(|items| records_from(items))
                .find(|records| !records.is_empty())
                .unwrap_or_default()
        }
        Payload::Unrecognized => Vec::new(),
    }
}

fn records_from(entries: &[Value]) -> Vec<CitationRecord> {
    entries
        .iter()
        .filter_map(Value::as_object)
        .filter_map(extract_record)
        .collect()
}

/// Trimmed non-empty string or stringified number
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn first_scalar(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| map.get(*key).and_then(scalar_text))
}

fn extract_year(text: &str) -> Option<String> {
    YEAR_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_author(value: &Value) -> Option<Author> {
    let author = match value {
        Value::Object(map) => Author::new(
            first_scalar(map, FAMILY_KEYS).unwrap_or_default(),
            first_scalar(map, GIVEN_KEYS).unwrap_or_default(),
        ),
        Value::String(name) => Author::from_display(name),
        _ => return None,
    };
    (!author.is_blank()).then_some(author)
}

fn extract_authors(map: &Map<String, Value>) -> Vec<Author> {
    AUTHOR_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array).filter(|l| !l.is_empty()))
        .map(|list| list.iter().filter_map(extract_author).collect())
        .unwrap_or_default()
}

fn extract_record(map: &Map<String, Value>) -> Option<CitationRecord> {
    let record = CitationRecord {
        title: first_scalar(map, TITLE_KEYS),
        authors: extract_authors(map),
        year: first_scalar(map, YEAR_KEYS).and_then(|raw| extract_year(&raw)),
        doi: first_scalar(map, DOI_KEYS),
        isbn: first_scalar(map, ISBN_KEYS),
    };
    (!record.is_empty()).then_some(record)
}
