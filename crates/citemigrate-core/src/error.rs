//! Error types for citemigrate-core
//!
//! Decode failures and unmatched citations are not errors: they surface as
//! `None` / skipped placeholders and never abort a run. Structural integrity
//! problems are reported as [`crate::verifier::IntegrityIssue`] values.

use thiserror::Error;
use zotero_client::ZoteroError;

/// Result type alias for citemigrate operations
pub type Result<T> = std::result::Result<T, CiteMigrateError>;

/// Main error type for citemigrate operations
#[derive(Error, Debug)]
pub enum CiteMigrateError {
    /// Document package errors (including unsafe member paths)
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Markup parse or write errors
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Connection or authentication failure against the Zotero API
    #[error("Could not connect to Zotero: {0}")]
    RemoteLibrary(#[from] ZoteroError),

    /// No free output file name next to the input
    #[error("Too many output files for {0}: clean up old converted copies")]
    OutputPathExhausted(String),

    /// The run was cancelled between documents
    #[error("Conversion cancelled")]
    Cancelled,

    /// The background task died or could not be joined
    #[error("Worker error: {0}")]
    Worker(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document package errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// A member path resolves outside the extraction root (zip-slip)
    #[error("Unsafe path in .docx archive: {member}. The file may be malicious.")]
    UnsafePath { member: String },

    /// The container could not be read or written
    #[error("Zip error: {0}")]
    Zip(String),

    #[error("IO error: {0}")]
    Io(String),

    /// A part was requested that the package does not contain
    #[error("Missing part: {0}")]
    MissingPart(String),
}

/// Markup errors
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Document has no root element")]
    NoRoot,

    #[error("Write error: {0}")]
    Write(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// No API key in the file and none in the environment
    #[error("No Zotero API key configured (set library.api_key or {0})")]
    MissingApiKey(String),

    #[error("No Zotero library id configured")]
    MissingLibraryId,
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        ArchiveError::Zip(err.to_string())
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        ArchiveError::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for CiteMigrateError {
    fn from(err: zip::result::ZipError) -> Self {
        CiteMigrateError::Archive(ArchiveError::Zip(err.to_string()))
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
