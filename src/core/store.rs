//! On-disk layout of a playdeck data root.
//!
//! ```text
//! <root>/data/config.json    ConfigDocument (playbooks_dir, ...)
//! <root>/data/history.json   History ledger
//! <root>/logs/app.log        Rotating audit log, newest line first
//! ```

use std::path::{Path, PathBuf};

pub const DATA_DIR: &str = "data";
pub const LOGS_DIR: &str = "logs";
pub const CONFIG_FILE: &str = "config.json";
pub const HISTORY_FILE: &str = "history.json";
pub const LOG_FILE: &str = "app.log";

/// Handle on a data root. Holds no open files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    /// Directory containing `data/` and `logs/`
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir().join(CONFIG_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir().join(HISTORY_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.root.join(LOGS_DIR).join(LOG_FILE)
    }
}
