//! Crash-safe persistence of the live pattern file
//!
//! The file has one writer (this store) and uncoordinated external readers.
//! Writes are serialized by an internal mutex and land via rename of a fully
//! flushed temporary file, so a reader sees either the old or the new text.

use crate::decode::parse_document;
use crate::error::{StoreError, WriteError};
use crate::header::PatternHeader;
use crate::render::{render, TIMESTAMP_FORMAT};
use parking_lot::Mutex;
use pattern_model::PatternDocument;
use std::ffi::OsString;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Suffix appended to the live file name for the single-generation backup
pub const BACKUP_SUFFIX: &str = ".bak";

/// Options for a single write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip validation; only for callers that have validated already
    pub skip_validation: bool,
}

impl WriteOptions {
    /// Set whether validation is skipped
    #[inline]
    #[must_use]
    pub fn with_skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }
}

/// Owner of the live pattern file and its backup
#[derive(Debug)]
pub struct PatternStore {
    path: PathBuf,
    backup_path: PathBuf,
    write_lock: Mutex<()>,
}

impl PatternStore {
    /// Create store for the file at `path`
    ///
    /// The file need not exist yet; the first write creates it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup_path = backup_path_for(&path);
        Self {
            path,
            backup_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Live file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backup file path
    #[inline]
    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Read the live file text unparsed
    ///
    /// # Errors
    /// Returns `StoreError::Read` if the file cannot be read.
    pub fn read_raw(&self) -> Result<String, StoreError> {
        std::fs::read_to_string(&self.path).map_err(|e| StoreError::read_error(&self.path, e))
    }

    /// Read and parse the live file into a fresh document
    ///
    /// # Errors
    /// Returns `StoreError::Read` or `StoreError::Parse`; no file is modified.
    pub fn read(&self) -> Result<PatternDocument, StoreError> {
        let text = self.read_raw()?;
        Ok(parse_document(&text)?)
    }

    /// Read the header comments of the live file
    ///
    /// # Errors
    /// Returns `StoreError::Read` if the file cannot be read.
    pub fn read_header(&self) -> Result<PatternHeader, StoreError> {
        Ok(PatternHeader::parse(&self.read_raw()?))
    }

    /// Validate and persist `doc`, replacing the live file wholesale
    ///
    /// # Errors
    /// Returns `StoreError::Validation` before touching disk if `doc` is
    /// invalid, or `StoreError::Write` if any persistence step fails. The live
    /// file is unmodified in every error case.
    pub fn write(&self, doc: &PatternDocument, description: &str) -> Result<(), StoreError> {
        self.write_with(doc, description, WriteOptions::default())
    }

    /// Persist `doc` with explicit options
    ///
    /// Steps, in order: validate, render, back up the live file, write a
    /// temporary file next to it, flush, rename over the live file.
    ///
    /// # Errors
    /// See [`PatternStore::write`].
    pub fn write_with(
        &self,
        doc: &PatternDocument,
        description: &str,
        options: WriteOptions,
    ) -> Result<(), StoreError> {
        if !options.skip_validation {
            pattern_model::check(doc)?;
        }

        let _guard = self.write_lock.lock();
        self.persist(doc, description)
    }

    /// Persist `doc` only if the live file still holds `expected`
    ///
    /// The comparison and the write happen under the writer lock, so a
    /// document derived from `expected` never overwrites a newer edit.
    ///
    /// # Errors
    /// Returns `StoreError::Conflict` if the live text differs from
    /// `expected`, otherwise as [`PatternStore::write`].
    pub fn write_if_unchanged(
        &self,
        expected: &str,
        doc: &PatternDocument,
        description: &str,
        options: WriteOptions,
    ) -> Result<(), StoreError> {
        if !options.skip_validation {
            pattern_model::check(doc)?;
        }

        let _guard = self.write_lock.lock();
        if self.read_raw()? != expected {
            warn!(path = %self.path.display(), "pattern changed since it was read");
            return Err(StoreError::Conflict {
                path: self.path.clone(),
            });
        }
        self.persist(doc, description)
    }

    // Caller holds `write_lock`
    fn persist(&self, doc: &PatternDocument, description: &str) -> Result<(), StoreError> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let text = render(doc, description, &timestamp).map_err(WriteError::from)?;

        let result = self.backup().and_then(|()| self.replace(&text));
        match &result {
            Ok(()) => info!(
                path = %self.path.display(),
                description,
                bpm = doc.bpm,
                "pattern written"
            ),
            Err(e) => warn!(path = %self.path.display(), error = %e, "pattern write failed"),
        }
        Ok(result?)
    }

    fn backup(&self) -> Result<(), WriteError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no live file to back up");
            return Ok(());
        }
        std::fs::copy(&self.path, &self.backup_path)
            .map(|_| ())
            .map_err(|source| WriteError::Backup {
                path: self.backup_path.clone(),
                source,
            })
    }

    fn replace(&self, text: &str) -> Result<(), WriteError> {
        let dir = parent_dir(&self.path);
        let temp_err = |source| WriteError::TempFile {
            dir: dir.to_path_buf(),
            source,
        };

        let mut temp = NamedTempFile::new_in(dir).map_err(temp_err)?;
        temp.write_all(text.as_bytes()).map_err(temp_err)?;
        temp.as_file().sync_all().map_err(temp_err)?;

        temp.persist(&self.path)
            .map(|_| ())
            .map_err(|e| WriteError::Replace {
                path: self.path.clone(),
                source: e.error,
            })
    }
}

fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("pattern"), OsString::from);
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
