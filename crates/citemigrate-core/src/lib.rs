//! citemigrate-core: Citavi to Zotero citation migration for .docx files
//!
//! This library provides:
//! - Safe extraction and repacking of Word packages (zip-slip checked)
//! - Discovery of Citavi placeholder content controls in body, footnotes and endnotes
//! - Payload decoding and normalization into citation records
//! - Matching against a Zotero library by DOI, ISBN, fuzzy score or display text
//! - Synthesis of Zotero `ADDIN ZOTERO_ITEM` / `ZOTERO_BIBL` field codes
//! - Post-conversion integrity checks and placeholder/field accounting
//! - Batch runs on a background worker with cancellation and redacted logging

pub mod archive;
pub mod batch;
pub mod config;
pub mod csl;
pub mod decoder;
pub mod display;
pub mod error;
pub mod identifiers;
pub mod logging;
pub mod matcher;
pub mod normalizer;
pub mod observer;
pub mod pipeline;
pub mod rewriter;
pub mod scanner;
pub mod synthesizer;
pub mod verifier;
pub mod worker;
pub mod xml;

// Re-export main types for convenience
pub use archive::{DocumentArchive, PartKind};
pub use batch::{allocate_output_path, run_batch, BatchSummary};
pub use config::{CiteMigrateConfig, ConversionConfig, LibraryConfig, MatchWeights};
pub use decoder::decode;
pub use display::{parse_display_text, DisplayCitation};
pub use error::{ArchiveError, CiteMigrateError, ConfigError, Result, XmlError};
pub use matcher::{DisplayResolution, LibraryIndex, LibraryMatcher, MatcherStats};
pub use normalizer::{normalize, Author, CitationRecord};
pub use observer::{ConversionObserver, TracingObserver};
pub use pipeline::{
    convert_document, convert_document_cancellable, verify_conversion, ConversionOptions, ConversionStats, VerificationOutcome,
    VerificationReport,
};
pub use scanner::{scan, Placeholder};
pub use synthesizer::{build_bibliography_field, build_citation_field, SynthesizedField};
pub use verifier::{verify, IntegrityIssue};
pub use worker::{ChannelObserver, ConversionJob, ConversionWorker, WorkerEvent, WorkerHandle};
pub use xml::{XmlDocument, XmlElement, XmlNode};

pub use zotero_client::{ApiKey, LibraryKind, LibraryRef, ZoteroItem};
