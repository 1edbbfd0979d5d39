//! Bounded, newest-first text log.
//!
//! The file holds at most `max_lines` physical lines with the most recent
//! line first. Every emit re-reads the whole file, prepends, truncates and
//! rewrites it, so the cost is O(max_lines) per call. That is fine for the
//! default capacity of 200 and is not meant for high-volume logging.

use crate::core::document::replace_file;
use crate::core::error::DeckError;
use crate::core::pool::global_pool;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_LINES: usize = 200;

/// Receives emit failures; the caller that triggered the log event never sees them.
pub type FallbackHandler = fn(&Path, &io::Error);

fn report_to_stderr(path: &Path, err: &io::Error) {
    eprintln!("playdeck: failed to write log {}: {}", path.display(), err);
}

#[derive(Debug, Clone)]
pub struct RotatingLog {
    path: PathBuf,
    max_lines: usize,
    fallback: FallbackHandler,
}

impl RotatingLog {
    /// Ensure the parent directory and the file exist. Idempotent; existing
    /// content is left untouched.
    pub fn initialize(path: impl Into<PathBuf>, max_lines: usize) -> Result<Self, DeckError> {
        if max_lines == 0 {
            return Err(DeckError::ValidationError(
                "rotating log capacity must be at least 1 line".to_string(),
            ));
        }
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DeckError::persist(parent, e))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| DeckError::persist(&path, e))?;
        Ok(Self {
            path,
            max_lines,
            fallback: report_to_stderr,
        })
    }

    pub fn with_fallback(mut self, fallback: FallbackHandler) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Prepend `line`, evicting the oldest lines beyond capacity.
    /// Failures are routed to the fallback handler.
    pub fn emit(&self, line: &str) {
        if let Err(err) = self.try_emit(line) {
            (self.fallback)(&self.path, &err);
        }
    }

    /// Same cycle as [`emit`](Self::emit) with the I/O error returned.
    pub fn try_emit(&self, line: &str) -> io::Result<()> {
        global_pool().with_lock(&self.path, || {
            let mut lines: Vec<String> = line.lines().map(str::to_owned).collect();
            if lines.is_empty() {
                lines.push(String::new());
            }
            lines.extend(self.read_lines());
            lines.truncate(self.max_lines);

            let mut text = lines.join("\n");
            text.push('\n');
            replace_file(&self.path, text.as_bytes())
        })
    }

    /// Current content, newest first. Unreadable file reads as empty.
    pub fn lines(&self) -> Vec<String> {
        self.read_lines()
    }

    fn read_lines(&self) -> Vec<String> {
        fs::read_to_string(&self.path)
            .map(|text| text.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}
