//! Whole-document JSON persistence.
//!
//! A [`DocumentStore`] owns exactly one file and always reads or writes the
//! entire document. Loads never fail: a missing file yields the caller's
//! default, and an unreadable or corrupt file yields the default after the
//! incident is logged. Saves go to a hidden sibling file that is renamed over
//! the target, so readers see either the previous or the new document.

use crate::core::error::DeckError;
use crate::core::pool::global_pool;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DocumentStore<T> {
    path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> DocumentStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, distinguishing "absent" (`Ok(None)`) from failures.
    pub fn try_load(&self) -> Result<Option<T>, DeckError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DeckError::access(&self.path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| DeckError::parse(&self.path, e))
    }

    /// Load the document or fall back to `default`. Never creates the file.
    pub fn load(&self, default: T) -> T {
        self.load_or_else(|| default)
    }

    fn load_or_else(&self, default: impl FnOnce() -> T) -> T {
        match self.try_load() {
            Ok(Some(doc)) => doc,
            Ok(None) => default(),
            Err(err) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %err,
                    "Error loading document, falling back to default"
                );
                default()
            }
        }
    }

    /// Serialize and replace the whole document.
    pub fn save(&self, doc: &T) -> Result<(), DeckError> {
        global_pool().with_lock(&self.path, || self.save_unlocked(doc))
    }

    /// One read-modify-write cycle under the file's lock. Returns the saved document.
    pub fn update<D, F>(&self, default: D, mutate: F) -> Result<T, DeckError>
    where
        D: FnOnce() -> T,
        F: FnOnce(&mut T) -> Result<(), DeckError>,
    {
        global_pool().with_lock(&self.path, || {
            let mut doc = self.load_or_else(default);
            mutate(&mut doc)?;
            self.save_unlocked(&doc)?;
            Ok(doc)
        })
    }

    fn save_unlocked(&self, doc: &T) -> Result<(), DeckError> {
        let text = serde_json::to_string_pretty(doc)
            .map_err(|e| DeckError::persist(&self.path, io::Error::from(e)))?;
        replace_file(&self.path, text.as_bytes()).map_err(|e| DeckError::persist(&self.path, e))
    }
}

/// Replace `path` with `bytes` via a sibling temp file and rename.
/// Creates the parent directory when missing.
pub(crate) fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    let written = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();
    if written.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    written
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
