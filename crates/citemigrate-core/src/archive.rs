//! .docx package access
//!
//! A package is extracted into a private temporary directory, edited part by
//! part, and repacked. Every member path is checked against the extraction
//! root before anything is written to disk.
//!
//! Repacking writes `[Content_Types].xml` first and uncompressed; Word refuses
//! packages where it is not the first entry. All other members are deflated
//! and written in sorted order so repacks are reproducible.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ArchiveError, Result};
use crate::xml::XmlDocument;

pub const CONTENT_TYPES: &str = "[Content_Types].xml";

/// A markup part that can carry citations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Document,
    Footnotes,
    Endnotes,
}

impl PartKind {
    /// Processing order
    pub const ALL: [PartKind; 3] = [PartKind::Document, PartKind::Footnotes, PartKind::Endnotes];

    pub fn path(&self) -> &'static str {
        match self {
            PartKind::Document => "word/document.xml",
            PartKind::Footnotes => "word/footnotes.xml",
            PartKind::Endnotes => "word/endnotes.xml",
        }
    }

    /// Only the main document part holds the body and the bibliography
    pub fn is_body(&self) -> bool {
        matches!(self, PartKind::Document)
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Resolve a member name under `root` without touching the filesystem.
///
/// Backslashes count as separators. Absolute names, drive prefixes and `..`
/// components that climb above `root` are rejected.
pub fn resolve_member(root: &Path, member: &str) -> std::result::Result<PathBuf, ArchiveError> {
    let unsafe_path = || ArchiveError::UnsafePath {
        member: member.to_string(),
    };

    let normalized = member.replace('\\', "/");
    let mut resolved = root.to_path_buf();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if resolved.as_path() == root {
                    return Err(unsafe_path());
                }
                resolved.pop();
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_path()),
        }
    }

    if !resolved.starts_with(root) {
        return Err(unsafe_path());
    }
    Ok(resolved)
}

/// An extracted package
pub struct DocumentArchive {
    // Held so the directory lives as long as the archive
    _dir: TempDir,
    root: PathBuf,
    source: PathBuf,
}

impl DocumentArchive {
    /// Extract `path`. Fails with [`ArchiveError::UnsafePath`] before writing
    /// any file if a single member would land outside the extraction root.
    pub fn open(path: &Path) -> std::result::Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let mut zip = ZipArchive::new(BufReader::new(file))?;

        let dir = tempfile::Builder::new().prefix("citemigrate-").tempdir()?;
        let root = dir.path().canonicalize()?;

        let mut targets = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i)?;
            let target = resolve_member(&root, entry.name())?;
            targets.push((i, target, entry.is_dir()));
        }

        for (i, target, is_dir) in targets {
            if is_dir || target == root {
                fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut entry = zip.by_index(i)?;
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
        }

        tracing::debug!(path = %path.display(), members = zip.len(), "Extracted package");

        Ok(Self {
            _dir: dir,
            root,
            source: path.to_path_buf(),
        })
    }

    /// Extraction root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Citation-bearing parts present in the package, in processing order
    pub fn parts(&self) -> Vec<PartKind> {
        PartKind::ALL
            .into_iter()
            .filter(|kind| self.root.join(kind.path()).is_file())
            .collect()
    }

    pub fn read_part(&self, kind: PartKind) -> Result<XmlDocument> {
        let path = self.root.join(kind.path());
        if !path.is_file() {
            return Err(ArchiveError::MissingPart(kind.path().to_string()).into());
        }
        let bytes = fs::read(&path)?;
        Ok(XmlDocument::parse_bytes(&bytes)?)
    }

    pub fn write_part(&self, kind: PartKind, document: &XmlDocument) -> Result<()> {
        let bytes = document.to_bytes()?;
        fs::write(self.root.join(kind.path()), bytes)?;
        Ok(())
    }

    /// Repack to `output`, replacing any existing file
    pub fn write(&self, output: &Path) -> std::result::Result<(), ArchiveError> {
        self.pack(File::create(output)?)
    }

    /// Repack to `output`, failing if it already exists
    pub fn write_new(&self, output: &Path) -> std::result::Result<(), ArchiveError> {
        let file = OpenOptions::new().write(true).create_new(true).open(output)?;
        self.pack(file)
    }

    /// Member names relative to the root, forward-slash separated, sorted
    fn members(&self) -> std::result::Result<Vec<String>, ArchiveError> {
        let mut members = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| ArchiveError::Io(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| ArchiveError::Io(e.to_string()))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            members.push(name);
        }
        members.sort();
        Ok(members)
    }

    fn pack(&self, file: File) -> std::result::Result<(), ArchiveError> {
        let mut writer = ZipWriter::new(BufWriter::new(file));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let members = self.members()?;
        if members.iter().any(|m| m == CONTENT_TYPES) {
            writer.start_file(CONTENT_TYPES, stored)?;
            io::copy(&mut File::open(self.root.join(CONTENT_TYPES))?, &mut writer)?;
        } else {
            tracing::warn!(source = %self.source.display(), "Package has no {}", CONTENT_TYPES);
        }

        for member in members.iter().filter(|m| *m != CONTENT_TYPES) {
            writer.start_file(member.as_str(), deflated)?;
            io::copy(&mut File::open(self.root.join(member))?, &mut writer)?;
        }

        let mut inner = writer.finish()?;
        inner.flush()?;
        Ok(())
    }
}
