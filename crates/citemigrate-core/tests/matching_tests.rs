//! Display-text parsing and library matching tests

use citemigrate_core::config::MatchWeights;
use citemigrate_core::display::parse_display_text;
use citemigrate_core::{CitationRecord, LibraryIndex, LibraryMatcher};
use rstest::rstest;
use zotero_client::{Creator, ZoteroItem};

fn library() -> LibraryIndex {
    LibraryIndex::new(vec![
        ZoteroItem::new("SMITH001", "journalArticle")
            .with_title("Advances in Molecular Biology")
            .with_date("2019")
            .with_doi("10.1234/jmb.2019.3")
            .with_creator(Creator::person("author", "Smith", "Jane")),
        ZoteroItem::new("WHO00001", "report")
            .with_title("World Health Statistics")
            .with_date("2020")
            .with_creator(Creator::organization("author", "World Health Organization")),
        ZoteroItem::new("MUELLER1", "book")
            .with_title("Einführung in die Soziologie")
            .with_date("2015")
            .with_isbn("978-3-16-148410-0")
            .with_creator(Creator::person("author", "Müller", "Hans")),
    ])
}

// === Display text ===

#[rstest]
#[case("(Smith 2019)", "Smith", "2019")]
#[case("(Smith et al. 2019)", "Smith", "2019")]
#[case("(Smith et al., 2019)", "Smith", "2019")]
#[case("(Smith & Jones 2019)", "Smith", "2019")]
#[case("(Smith and Jones, 2019)", "Smith", "2019")]
#[case("(vgl. Müller 2015)", "Müller", "2015")]
#[case("(s. Müller 2015)", "Müller", "2015")]
#[case("(s. a. Müller, 2015)", "Müller", "2015")]
#[case("(see also Brown, 2010)", "Brown", "2010")]
#[case("(Meier und Schulz 2017)", "Meier", "2017")]
#[case("(Doe J. 2001)", "Doe", "2001")]
#[case("[Smith 2019a]", "Smith", "2019")]
fn test_primary_author_and_year(#[case] text: &str, #[case] author: &str, #[case] year: &str) {
    let groups = parse_display_text(text);
    assert_eq!(groups.len(), 1, "{}", text);
    assert_eq!(groups[0].primary_author, author);
    assert_eq!(groups[0].year, year);
}

#[rstest]
#[case("(Smith 2019; Doe 2001; Lee 1999)", 3)]
#[case("(ibid.; Doe 2001)", 1)]
#[case("(n.d.)", 0)]
#[case("", 0)]
fn test_group_count(#[case] text: &str, #[case] expected: usize) {
    assert_eq!(parse_display_text(text).len(), expected);
}

// === Library matching ===

#[test]
fn test_doi_wins_over_everything_else() {
    let mut matcher = LibraryMatcher::new(library());
    let record = CitationRecord::default()
        .with_title("Completely unrelated title")
        .with_author("Nobody", "")
        .with_year("1850")
        .with_doi("https://doi.org/10.1234/JMB.2019.3");
    assert_eq!(matcher.match_record(&record).unwrap().key, "SMITH001");
}

#[test]
fn test_isbn_ignores_hyphens() {
    let mut matcher = LibraryMatcher::new(library());
    let record = CitationRecord::default().with_isbn("9783161484100");
    assert_eq!(matcher.match_record(&record).unwrap().key, "MUELLER1");
}

#[test]
fn test_repeated_lookups_hit_the_cache() {
    let mut matcher = LibraryMatcher::new(library());
    let record = CitationRecord::default().with_author("Smith", "").with_year("2019");

    let first = matcher.match_record(&record);
    let second = matcher.match_record(&record);
    assert_eq!(first, second);
    assert_eq!(first.unwrap().key, "SMITH001");

    let stats = matcher.stats();
    assert_eq!(stats.lookups, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.scans, 1);
}

#[test]
fn test_organization_resolved_from_display_text() {
    let mut matcher = LibraryMatcher::new(library());
    let resolution = matcher.resolve_display_text("(World Health Organization 2020; Lee 1999)");
    assert_eq!(resolution.matched.len(), 1);
    assert_eq!(resolution.matched[0].key, "WHO00001");
    assert_eq!(resolution.unresolved, vec!["Lee, 1999".to_string()]);
}

#[test]
fn test_raised_threshold_rejects_year_and_author_only() {
    let weights = MatchWeights {
        accept_threshold: 6.0,
        ..MatchWeights::default()
    };
    let mut matcher = LibraryMatcher::with_weights(library(), weights);
    let record = CitationRecord::default().with_author("Smith", "").with_year("2019");
    assert!(matcher.match_record(&record).is_none());
}
