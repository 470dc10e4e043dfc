//! Single-document conversion
//!
//! Parts are processed in the order document, footnotes, endnotes. Within a
//! part every placeholder is resolved in document order:
//!
//! 1. decode and normalize the embedded payload, match each record
//! 2. if nothing matched, parse the visible citation text and match that
//! 3. synthesize a Zotero field for the matched items, or skip
//!
//! Bibliography handling runs once on the main document part after all parts
//! are done: Citavi bibliographies are removed and, if anything was converted,
//! a Zotero bibliography field is appended. Modified parts are verified and
//! written back before the package is repacked.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use zotero_client::{LibraryRef, ZoteroItem};

use crate::archive::{DocumentArchive, PartKind};
use crate::config::{CiteMigrateConfig, DEFAULT_INSTRUCTION_CHUNK, DEFAULT_STYLE_URI};
use crate::error::{CiteMigrateError, ConfigError, Result};
use crate::matcher::LibraryMatcher;
use crate::normalizer::normalize;
use crate::observer::ConversionObserver;
use crate::rewriter::{append_bibliography, remove_legacy_bibliography, replace_all};
use crate::scanner::{count_instructions_containing, count_placeholders, scan, Placeholder};
use crate::synthesizer::{build_citation_field, CITATION_MARKER};
use crate::verifier::verify;
use crate::xml::XmlDocument;

/// Per-document counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub converted: usize,
    pub skipped: usize,
    /// `"family, year"` for every citation that found no library item
    pub unmatched: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Library the item URIs point into
    pub library: LibraryRef,
    pub style_uri: String,
    pub instruction_chunk_size: usize,
    /// Compare original and converted packages after each conversion
    pub verify: bool,
    pub output_suffix: String,
}

impl ConversionOptions {
    pub fn new(library: LibraryRef) -> Self {
        Self {
            library,
            style_uri: DEFAULT_STYLE_URI.to_string(),
            instruction_chunk_size: DEFAULT_INSTRUCTION_CHUNK,
            verify: true,
            output_suffix: "_zotero".to_string(),
        }
    }

    pub fn from_config(config: &CiteMigrateConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            library: config.library_ref()?,
            style_uri: config.conversion.style_uri.clone(),
            instruction_chunk_size: config.conversion.instruction_chunk_size,
            verify: config.conversion.verify,
            output_suffix: config.conversion.output_suffix.clone(),
        })
    }

    pub fn with_style_uri(mut self, style_uri: &str) -> Self {
        self.style_uri = style_uri.to_string();
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }
}

/// Convert `input` into a new package at `output`. An existing file at
/// `output` is never overwritten.
pub fn convert_document(
    input: &Path,
    output: &Path,
    matcher: &mut LibraryMatcher,
    options: &ConversionOptions,
    observer: &dyn ConversionObserver,
) -> Result<ConversionStats> {
    convert_document_cancellable(input, output, matcher, options, observer, &AtomicBool::new(false))
}

/// [`convert_document`] that gives up with [`CiteMigrateError::Cancelled`]
/// once `cancel` is set. The flag is checked before each part and before the
/// package is written, so a cancelled run leaves no output behind.
pub fn convert_document_cancellable(
    input: &Path,
    output: &Path,
    matcher: &mut LibraryMatcher,
    options: &ConversionOptions,
    observer: &dyn ConversionObserver,
    cancel: &AtomicBool,
) -> Result<ConversionStats> {
    let check_cancel = || {
        if cancel.load(Ordering::SeqCst) {
            Err(CiteMigrateError::Cancelled)
        } else {
            Ok(())
        }
    };

    observer.log(&format!("Citation style: {}", options.style_uri));
    observer.log("Extracting .docx...");
    let archive = DocumentArchive::open(input)?;

    let mut stats = ConversionStats::default();
    let mut parts: Vec<(PartKind, XmlDocument, bool)> = Vec::new();
    for kind in archive.parts() {
        check_cancel()?;
        observer.log(&format!("Processing {}...", kind));
        let mut document = archive.read_part(kind)?;
        let modified = convert_part(kind, &mut document, matcher, options, &mut stats, observer)?;
        parts.push((kind, document, modified));
    }

    if let Some((_, document, modified)) = parts.iter_mut().find(|(kind, _, _)| kind.is_body()) {
        let prefix = document.w_prefix();
        let removed = remove_legacy_bibliography(&mut document.root);
        if removed > 0 {
            observer.log(&format!("Removed {} Citavi bibliography element(s)", removed));
            *modified = true;
        }
        if stats.converted > 0 {
            if let Some(field) = append_bibliography(&mut document.root, &options.style_uri, &prefix)? {
                observer.log(&format!(
                    "Added Zotero bibliography field at end of document (style: {})",
                    field.style_uri.as_deref().unwrap_or_default()
                ));
                *modified = true;
            }
        }
    }

    for (kind, document, modified) in &parts {
        if !modified {
            continue;
        }
        let issues = verify(&document.root);
        if issues.is_empty() {
            observer.log(&format!("Integrity check for {}: PASSED", kind));
        } else {
            for issue in &issues {
                tracing::warn!(part = %kind, %issue, "Integrity issue");
                observer.log(&format!("Integrity issue in {}: {}", kind, issue));
            }
        }
        archive.write_part(*kind, document)?;
    }

    check_cancel()?;
    observer.log("Repacking .docx...");
    archive.write_new(output)?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        converted = stats.converted,
        skipped = stats.skipped,
        unmatched = stats.unmatched.len(),
        "Converted document"
    );
    Ok(stats)
}

/// Convert every placeholder of one part; returns whether the part changed
fn convert_part(
    kind: PartKind,
    document: &mut XmlDocument,
    matcher: &mut LibraryMatcher,
    options: &ConversionOptions,
    stats: &mut ConversionStats,
    observer: &dyn ConversionObserver,
) -> Result<bool> {
    let placeholders = scan(kind, &document.root);
    if placeholders.is_empty() {
        return Ok(false);
    }
    observer.log(&format!(
        "Found {} Citavi citation(s) in {}",
        placeholders.len(),
        kind
    ));

    let mut replacements = Vec::new();
    for placeholder in &placeholders {
        observer.log(&format!("Processing: {}", placeholder.label()));
        let items = resolve_placeholder(placeholder, matcher, stats, observer);
        if items.is_empty() {
            observer.log("  SKIPPED - no Zotero match");
            stats.skipped += 1;
            continue;
        }
        let field = build_citation_field(
            &items,
            &options.library,
            &placeholder.display_text,
            options.instruction_chunk_size,
        )?;
        replacements.push((placeholder.path.clone(), field));
    }

    let prefix = document.w_prefix();
    let applied = replace_all(&mut document.root, replacements, &prefix);
    if applied > 0 {
        observer.log(&format!("Replaced {} placeholder(s) with Zotero field codes", applied));
    }
    stats.converted += applied;
    Ok(applied > 0)
}

/// Payload records first, display text when none of them matched
fn resolve_placeholder(
    placeholder: &Placeholder,
    matcher: &mut LibraryMatcher,
    stats: &mut ConversionStats,
    observer: &dyn ConversionObserver,
) -> Vec<ZoteroItem> {
    let payload = placeholder.payload();
    let records = payload.as_ref().map(normalize).unwrap_or_default();
    match &payload {
        None => observer.log("  Warning: Could not decode Citavi payload (will try display text)"),
        Some(_) if !records.is_empty() => {
            observer.log(&format!("  Decoded {} citation(s) from payload", records.len()))
        }
        Some(_) => {}
    }

    let mut items = Vec::new();
    for record in &records {
        match matcher.match_record(record) {
            Some(item) => {
                observer.log(&format!("  Matched: {}", item.label()));
                items.push(item);
            }
            None => {
                observer.log(&format!("  No match: {}", record.descriptor()));
                stats.unmatched.push(record.descriptor());
            }
        }
    }

    if items.is_empty() && !placeholder.display_text.is_empty() {
        observer.log("  Trying display text fallback...");
        let resolution = matcher.resolve_display_text(&placeholder.display_text);
        if !resolution.matched.is_empty() {
            observer.log(&format!(
                "  Matched {} item(s) via display text",
                resolution.matched.len()
            ));
        }
        // Records that failed were already reported
        if records.is_empty() {
            stats.unmatched.extend(resolution.unresolved);
        }
        items = resolution.matched;
    }

    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerificationOutcome {
    /// The original had nothing to convert
    NoLegacyCitations,
    /// No Citavi placeholder remains and at least one Zotero field exists
    Success,
    Partial,
    Failure,
}

/// Placeholder and field counts across all citation-bearing parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub original_legacy: usize,
    pub remaining_legacy: usize,
    pub zotero_citations: usize,
    pub outcome: VerificationOutcome,
}

impl VerificationReport {
    pub fn from_counts(original_legacy: usize, remaining_legacy: usize, zotero_citations: usize) -> Self {
        let outcome = if original_legacy == 0 {
            VerificationOutcome::NoLegacyCitations
        } else if remaining_legacy == 0 && zotero_citations > 0 {
            VerificationOutcome::Success
        } else if zotero_citations > 0 {
            VerificationOutcome::Partial
        } else {
            VerificationOutcome::Failure
        };
        Self {
            original_legacy,
            remaining_legacy,
            zotero_citations,
            outcome,
        }
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            VerificationOutcome::NoLegacyCitations => {
                write!(f, "No Citavi citations found in original.")
            }
            VerificationOutcome::Success => write!(
                f,
                "All {} Citavi citations successfully converted!",
                self.original_legacy
            ),
            VerificationOutcome::Partial => write!(
                f,
                "Partial: {} converted, {} Citavi remaining.",
                self.zotero_citations, self.remaining_legacy
            ),
            VerificationOutcome::Failure => write!(f, "Conversion may have failed."),
        }
    }
}

/// `(Citavi placeholders, Zotero citation fields)` in one package
fn count_fields(path: &Path) -> Result<(usize, usize)> {
    let archive = DocumentArchive::open(path)?;
    let mut legacy = 0;
    let mut zotero = 0;
    for kind in archive.parts() {
        let document = archive.read_part(kind)?;
        legacy += count_placeholders(&document.root);
        zotero += count_instructions_containing(&document.root, CITATION_MARKER);
    }
    Ok((legacy, zotero))
}

/// Compare an original package with its converted copy
pub fn verify_conversion(original: &Path, converted: &Path) -> Result<VerificationReport> {
    let (original_legacy, _) = count_fields(original)?;
    let (remaining_legacy, zotero_citations) = count_fields(converted)?;
    Ok(VerificationReport::from_counts(
        original_legacy,
        remaining_legacy,
        zotero_citations,
    ))
}
