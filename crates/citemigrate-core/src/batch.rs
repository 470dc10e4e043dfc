//! Multi-document runs
//!
//! Documents are converted one after another against a shared matcher, so the
//! match cache carries over between files. A failing document is logged and
//! counted; it never stops the batch.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::error::{CiteMigrateError, Result};
use crate::matcher::LibraryMatcher;
use crate::observer::ConversionObserver;
use crate::pipeline::{convert_document_cancellable, verify_conversion, ConversionOptions, ConversionStats};

const MAX_OUTPUT_ATTEMPTS: usize = 1000;

/// First free `<stem><suffix>.docx` next to `input`, then `<stem><suffix>_1.docx`
/// and so on.
pub fn allocate_output_path(input: &Path, suffix: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = input.parent().unwrap_or_else(|| Path::new(""));

    let candidate = dir.join(format!("{}{}.docx", stem, suffix));
    if !candidate.exists() {
        return Ok(candidate);
    }
    for n in 1..MAX_OUTPUT_ATTEMPTS {
        let candidate = dir.join(format!("{}{}_{}.docx", stem, suffix, n));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(CiteMigrateError::OutputPathExhausted(
        input.display().to_string(),
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_converted: usize,
    pub total_skipped: usize,
    pub total_unmatched: usize,
    /// Outputs written, in input order
    pub output_paths: Vec<PathBuf>,
    /// The run stopped early on request
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Files processed: {}/{}", self.successful, self.total_files),
            format!("Citations converted: {}", self.total_converted),
            format!("Citations skipped: {}", self.total_skipped),
        ];
        if self.total_unmatched > 0 {
            lines.push(format!("Unmatched references: {}", self.total_unmatched));
        }
        if self.failed > 0 {
            lines.push(format!("Failed files: {}", self.failed));
        }
        if self.cancelled {
            lines.push("Conversion cancelled".to_string());
        }
        lines
    }
}

/// Convert `inputs` in order. `cancel` is checked before each document and
/// inside it; a document interrupted mid-way writes no output.
pub fn run_batch(
    inputs: &[PathBuf],
    matcher: &mut LibraryMatcher,
    options: &ConversionOptions,
    observer: &dyn ConversionObserver,
    cancel: &AtomicBool,
) -> BatchSummary {
    let mut summary = BatchSummary {
        total_files: inputs.len(),
        ..Default::default()
    };

    for (index, input) in inputs.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            observer.log("Cancellation requested, stopping before next document");
            summary.cancelled = true;
            break;
        }
        observer.progress(index + 1, inputs.len());
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());
        observer.log(&format!("[{}/{}] {}", index + 1, inputs.len(), name));

        match convert_one(input, matcher, options, observer, cancel) {
            Ok((output, stats)) => {
                summary.successful += 1;
                summary.total_converted += stats.converted;
                summary.total_skipped += stats.skipped;
                summary.total_unmatched += stats.unmatched.len();
                observer.log(&format!("Saved: {}", output.display()));
                summary.output_paths.push(output);
            }
            Err(CiteMigrateError::Cancelled) => {
                observer.log(&format!("Cancelled while converting {}, no output written", name));
                summary.cancelled = true;
                break;
            }
            Err(e) => {
                tracing::error!(input = %input.display(), error = %e, "Document failed");
                observer.log(&format!("ERROR: {}", e));
                summary.failed += 1;
            }
        }
    }

    for line in summary.lines() {
        observer.log(&line);
    }
    summary
}

fn convert_one(
    input: &Path,
    matcher: &mut LibraryMatcher,
    options: &ConversionOptions,
    observer: &dyn ConversionObserver,
    cancel: &AtomicBool,
) -> Result<(PathBuf, ConversionStats)> {
    let output = allocate_output_path(input, &options.output_suffix)?;
    let stats = convert_document_cancellable(input, &output, matcher, options, observer, cancel)?;
    observer.log(&format!(
        "Converted: {}, Skipped: {}",
        stats.converted, stats.skipped
    ));
    if !stats.unmatched.is_empty() {
        observer.log(&format!("Unmatched: {}", stats.unmatched.join("; ")));
    }

    if options.verify {
        match verify_conversion(input, &output) {
            Ok(report) => observer.log(&format!("Verification: {}", report)),
            Err(e) => observer.log(&format!("Verification failed: {}", e)),
        }
    }
    Ok((output, stats))
}
