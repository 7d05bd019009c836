//! Whole-document JSON persistence with atomic replacement.
//!
//! Every persisted document is read in full, mutated in memory and
//! written back in full. Writes go to `<name>.tmp` first and are renamed
//! over the target, so the next cycle never observes a partial file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AutopilotError, Result};

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Default lock file name, placed in the data directory.
pub const LOCK_FILENAME: &str = ".autopilot.lock";

/// A JSON document stored at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
}

impl JsonDocument {
    /// Creates a handle for the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path used for the in-progress write.
    #[must_use]
    pub fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(TMP_SUFFIX);
        self.path.with_file_name(name)
    }

    /// Checks if the document exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the document, returning `None` if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`AutopilotError::Document`] if the file exists but cannot be
    /// read or parsed.
    pub fn load_optional<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AutopilotError::document(&self.path, e.to_string())),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| AutopilotError::document(&self.path, e.to_string()))
    }

    /// Loads the document or returns the type's default if it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is unreadable or corrupt.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self) -> Result<T> {
        Ok(self.load_optional()?.unwrap_or_default())
    }

    /// Loads a cache-like document, treating corruption as absence.
    ///
    /// Used for documents whose loss only degrades data quality.
    pub fn load_lenient<T: DeserializeOwned>(&self) -> Option<T> {
        match self.load_optional() {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Ignoring unreadable document: {}", e);
                None
            }
        }
    }

    /// Writes the document atomically as pretty JSON with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn save_atomic<T: Serialize>(&self, value: &T) -> Result<()> {
        let mut json = serde_json::to_string_pretty(value)?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes())
    }
}

/// Writes `contents` to `path` through a temporary file and a rename.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created or the
/// write, sync or rename fails.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = JsonDocument::new(path).tmp_path();
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(contents)?;
    tmp_file.sync_all()?;
    fs::rename(&tmp_path, path)?;

    debug!("Wrote {}", path.display());
    Ok(())
}

/// Exclusive advisory lock held for the lifetime of a run.
///
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquires the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`AutopilotError::AlreadyRunning`] if another process holds it.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&path)?;
        FileExt::try_lock_exclusive(&file).map_err(|_| AutopilotError::AlreadyRunning {
            lock_path: path.clone(),
        })?;

        Ok(Self { file, path })
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
