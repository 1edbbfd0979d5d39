//! Operator settings: the `data/config.json` document and the inventory file.

use crate::core::config::DEFAULT_HOSTS_FILE;
use crate::core::document::DocumentStore;
use crate::core::error::DeckError;
use crate::core::pool::global_pool;
use crate::core::time::cli_envelope;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PLAYBOOKS_DIR_KEY: &str = "playbooks_dir";
pub const HOSTS_FILE_KEY: &str = "hosts_file";

/// JSON object of named settings. Keys playdeck does not recognize are kept
/// and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument(Map<String, Value>);

impl ConfigDocument {
    pub fn with_playbooks_dir(dir: impl Into<String>) -> Self {
        let mut doc = Self::default();
        doc.set_playbooks_dir(dir);
        doc
    }

    /// `None` when the key is absent or not a string.
    pub fn playbooks_dir(&self) -> Option<&str> {
        self.0.get(PLAYBOOKS_DIR_KEY).and_then(Value::as_str)
    }

    pub fn set_playbooks_dir(&mut self, dir: impl Into<String>) {
        self.0
            .insert(PLAYBOOKS_DIR_KEY.to_string(), Value::String(dir.into()));
    }

    pub fn hosts_file(&self) -> Option<&str> {
        self.0
            .get(HOSTS_FILE_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

pub struct ConfigStore {
    docs: DocumentStore<ConfigDocument>,
    default_playbooks_dir: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, default_playbooks_dir: impl Into<PathBuf>) -> Self {
        Self {
            docs: DocumentStore::new(path),
            default_playbooks_dir: default_playbooks_dir.into(),
        }
    }

    pub fn path(&self) -> &Path {
        self.docs.path()
    }

    pub fn default_document(&self) -> ConfigDocument {
        ConfigDocument::with_playbooks_dir(self.default_playbooks_dir.display().to_string())
    }

    /// Current document. `playbooks_dir` is always present in the result.
    pub fn load(&self) -> ConfigDocument {
        let mut doc = self.docs.load(self.default_document());
        if doc.playbooks_dir().is_none() {
            doc.set_playbooks_dir(self.default_playbooks_dir.display().to_string());
        }
        doc
    }

    pub fn save(&self, doc: &ConfigDocument) -> Result<(), DeckError> {
        self.docs.save(doc)
    }

    pub fn playbooks_dir(&self) -> PathBuf {
        match self.load().playbooks_dir() {
            Some(dir) => PathBuf::from(dir),
            None => self.default_playbooks_dir.clone(),
        }
    }

    /// The inventory path: the document's `hosts_file` if set, else `fallback`.
    pub fn hosts_file(&self, fallback: &Path) -> PathBuf {
        self.load()
            .hosts_file()
            .map(PathBuf::from)
            .unwrap_or_else(|| fallback.to_path_buf())
    }

    pub fn update_playbooks_dir(&self, dir: &str) -> Result<ConfigDocument, DeckError> {
        let dir = dir.trim();
        if dir.is_empty() {
            return Err(DeckError::ValidationError(
                "Directory path cannot be empty".to_string(),
            ));
        }
        let doc = self.docs.update(
            || self.default_document(),
            |doc| {
                doc.set_playbooks_dir(dir);
                Ok(())
            },
        )?;
        tracing::info!("Updated playbooks directory to: {}", dir);
        Ok(doc)
    }

    /// Write the default document if the file is absent. Returns true when created.
    pub fn ensure_initialized(&self) -> Result<bool, DeckError> {
        if self.path().exists() {
            return Ok(false);
        }
        self.docs.save(&self.default_document())?;
        Ok(true)
    }
}

/// Inventory to pass explicitly with `-i`; the tool's own default stays implicit.
pub fn explicit_inventory(hosts: &Path) -> Option<&Path> {
    (hosts != Path::new(DEFAULT_HOSTS_FILE)).then_some(hosts)
}

/// The automation tool's inventory (hosts) file, edited as plain text.
#[derive(Debug, Clone)]
pub struct InventoryFile {
    path: PathBuf,
}

impl InventoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<String, DeckError> {
        fs::read_to_string(&self.path).map_err(|e| DeckError::access(&self.path, e))
    }

    /// Overwrite the file in place. The file must already exist; only
    /// write permission on the file itself is needed.
    pub fn write(&self, content: &str) -> Result<(), DeckError> {
        global_pool().with_lock(&self.path, || {
            let mut file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)
                .map_err(|e| DeckError::access(&self.path, e))?;
            file.write_all(content.as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(|e| DeckError::persist(&self.path, e))
        })
    }
}

#[derive(Parser, Debug)]
#[clap(name = "settings", about = "Show or change operator settings")]
pub struct SettingsCli {
    #[clap(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommand {
    /// Print the settings document and the resolved paths.
    Show,
    /// Point playdeck at another playbooks directory.
    SetPlaybooksDir { dir: String },
    /// Print the inventory (hosts) file.
    Hosts,
}

/// `default_hosts_file` is used when the document has no `hosts_file`.
pub fn run_settings_cli(
    settings: &ConfigStore,
    default_hosts_file: &Path,
    cli: SettingsCli,
) -> Result<(), DeckError> {
    match cli.command {
        SettingsCommand::Show => {
            let doc = settings.load();
            println!(
                "{} {}",
                "playbooks_dir:".bold(),
                settings.playbooks_dir().display()
            );
            println!(
                "{} {}",
                "hosts_file:   ".bold(),
                settings.hosts_file(default_hosts_file).display()
            );
            println!("{} {}", "document:     ".bold(), settings.path().display());
            let text = serde_json::to_string_pretty(&doc).map_err(std::io::Error::other)?;
            println!("{}", text.dimmed());
        }
        SettingsCommand::SetPlaybooksDir { dir } => {
            let doc = settings.update_playbooks_dir(&dir)?;
            println!(
                "{}",
                cli_envelope(
                    "settings.set_playbooks_dir",
                    "ok",
                    json!({ "playbooks_dir": doc.playbooks_dir() }),
                )
            );
        }
        SettingsCommand::Hosts => {
            let inventory = InventoryFile::new(settings.hosts_file(default_hosts_file));
            print!("{}", inventory.read()?);
        }
    }
    Ok(())
}
