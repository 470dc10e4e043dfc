//! DOI and ISBN normalization for exact matching

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ISBN_SEPARATORS: Regex = Regex::new(r"[\s-]").unwrap();
}

/// Lower-case a DOI and strip resolver and `doi:` prefixes plus trailing
/// punctuation
pub fn normalize_doi(doi: &str) -> String {
    let mut result = doi.trim().to_lowercase();

    let prefixes = [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ];
    for prefix in prefixes {
        if let Some(stripped) = result.strip_prefix(prefix) {
            result = stripped.trim_start().to_string();
            break;
        }
    }

    while let Some(c) = result.chars().last() {
        if c == '.' || c == ',' || c == ';' {
            result.pop();
        } else {
            break;
        }
    }

    result
}

/// Strip hyphens and whitespace; upper-case the `X` check digit
pub fn normalize_isbn(isbn: &str) -> String {
    ISBN_SEPARATORS.replace_all(isbn, "").to_uppercase()
}
