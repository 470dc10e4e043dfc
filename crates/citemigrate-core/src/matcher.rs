//! Citation → Zotero item matching
//!
//! Lookup order:
//! 1. Exact DOI (normalized)
//! 2. Exact ISBN (hyphens and whitespace ignored)
//! 3. Fuzzy score over every library item: year in date, primary author
//!    against creators, title token overlap. The best score wins if it reaches
//!    the acceptance threshold; ties keep the earlier item.
//!
//! Results are memoized per canonical record, so repeated citations of the
//! same work cost one scan.

use std::collections::{HashMap, HashSet};

use zotero_client::{ZoteroClient, ZoteroError, ZoteroItem};

use crate::config::MatchWeights;
use crate::display::parse_display_text;
use crate::identifiers::{normalize_doi, normalize_isbn};
use crate::normalizer::CitationRecord;

/// Every citable top-level item of one library, fetched once per run
#[derive(Debug, Clone, Default)]
pub struct LibraryIndex {
    items: Vec<ZoteroItem>,
}

impl LibraryIndex {
    /// Notes, attachments and annotations are dropped
    pub fn new(items: Vec<ZoteroItem>) -> Self {
        Self {
            items: items.into_iter().filter(|i| i.is_citable()).collect(),
        }
    }

    pub async fn fetch(client: &ZoteroClient) -> Result<Self, ZoteroError> {
        let items = client.all_top_items().await?;
        tracing::info!(library = %client.library(), items = items.len(), "Loaded library index");
        Ok(Self::new(items))
    }

    pub fn items(&self) -> &[ZoteroItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ZoteroItem> {
        self.items.iter().find(|i| i.key == key)
    }
}

/// Counters for cache behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatcherStats {
    pub lookups: usize,
    pub cache_hits: usize,
    /// Lookups that walked the index
    pub scans: usize,
}

/// Outcome of resolving rendered citation text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayResolution {
    pub matched: Vec<ZoteroItem>,
    /// `"author, year"` for every parsed group that found nothing
    pub unresolved: Vec<String>,
}

pub struct LibraryMatcher {
    index: LibraryIndex,
    weights: MatchWeights,
    cache: HashMap<String, Option<usize>>,
    stats: MatcherStats,
}

impl LibraryMatcher {
    pub fn new(index: LibraryIndex) -> Self {
        Self::with_weights(index, MatchWeights::default())
    }

    pub fn with_weights(index: LibraryIndex, weights: MatchWeights) -> Self {
        Self {
            index,
            weights,
            cache: HashMap::new(),
            stats: MatcherStats::default(),
        }
    }

    pub fn index(&self) -> &LibraryIndex {
        &self.index
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    pub fn stats(&self) -> MatcherStats {
        self.stats
    }

    pub fn match_record(&mut self, record: &CitationRecord) -> Option<ZoteroItem> {
        self.stats.lookups += 1;
        let key = record.canonical_key();

        if let Some(&cached) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            return cached.map(|i| self.index.items[i].clone());
        }

        let found = if record.has_match_signal() {
            self.stats.scans += 1;
            self.find(record)
        } else {
            None
        };
        self.cache.insert(key, found);
        found.map(|i| self.index.items[i].clone())
    }

    pub fn match_by_display_text(&mut self, text: &str) -> Vec<ZoteroItem> {
        self.resolve_display_text(text).matched
    }

    pub fn resolve_display_text(&mut self, text: &str) -> DisplayResolution {
        let mut resolution = DisplayResolution::default();
        for group in parse_display_text(text) {
            let found = group
                .queries()
                .iter()
                .find_map(|query| self.match_record(query));
            match found {
                Some(item) => resolution.matched.push(item),
                None => resolution.unresolved.push(group.descriptor()),
            }
        }
        resolution
    }

    fn find(&self, record: &CitationRecord) -> Option<usize> {
        if let Some(doi) = record.doi.as_deref().map(normalize_doi).filter(|d| !d.is_empty()) {
            if let Some(i) = self
                .index
                .items
                .iter()
                .position(|item| normalize_doi(&item.data.doi) == doi)
            {
                return Some(i);
            }
        }

        if let Some(isbn) = record.isbn.as_deref().map(normalize_isbn).filter(|s| !s.is_empty()) {
            if let Some(i) = self
                .index
                .items
                .iter()
                .position(|item| normalize_isbn(&item.data.isbn) == isbn)
            {
                return Some(i);
            }
        }

        let title = record.title.as_deref().unwrap_or_default().to_lowercase();
        let year = record.year.as_deref().unwrap_or_default();
        let family = record.primary_family().unwrap_or_default().to_lowercase();

        let mut best: Option<(usize, f64)> = None;
        for (i, item) in self.index.items.iter().enumerate() {
            let score = self.score(item, &title, year, &family);
            if score >= self.weights.accept_threshold && best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        best.map(|(i, _)| i)
    }

    fn score(&self, item: &ZoteroItem, title: &str, year: &str, family: &str) -> f64 {
        let data = &item.data;
        let mut score = 0.0;

        if !year.is_empty() && data.date.contains(year) {
            score += self.weights.year_weight;
        }

        if !family.is_empty() && creators_match(item, family) {
            score += self.weights.author_weight;
        }

        if !title.is_empty() {
            let ratio = title_overlap_ratio(title, &data.title);
            if ratio > self.weights.title_ratio_threshold {
                score += self.weights.title_weight * ratio;
            }
        }

        score
    }
}

/// `family` (lower-cased) equals a creator last name, or equals or is
/// contained in an organisational creator name
fn creators_match(item: &ZoteroItem, family: &str) -> bool {
    item.data.creators.iter().any(|creator| {
        let last = creator.last_name.to_lowercase();
        let name = creator.name.to_lowercase();
        (!last.is_empty() && last == family) || (!name.is_empty() && name.contains(family))
    })
}

/// Shared lower-cased whitespace tokens divided by the larger token set
pub fn title_overlap_ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let a_words: HashSet<&str> = a.split_whitespace().collect();
    let b_words: HashSet<&str> = b.split_whitespace().collect();
    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }
    let shared = a_words.intersection(&b_words).count();
    shared as f64 / a_words.len().max(b_words.len()) as f64
}
