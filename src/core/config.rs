//! Process configuration.
//!
//! Resolution order, later wins: built-in defaults, `playdeck.toml` (or the
//! file given with `--config`), `PLAYDECK_*` environment variables, CLI flags.
//! This is distinct from the operator-editable `ConfigDocument` kept under
//! `data/config.json`.

use crate::core::error::DeckError;
use crate::core::rotating_log::DEFAULT_MAX_LINES;
use crate::core::store::Store;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "playdeck.toml";

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_PLAYBOOKS_DIR: &str = "/etc/ansible/playbooks";
pub const DEFAULT_HOSTS_FILE: &str = "/etc/ansible/hosts";
pub const DEFAULT_ANSIBLE_BIN: &str = "ansible-playbook";
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 600;
/// 256 MiB. Run outputs are kept whole, so exports grow well past the
/// 2 MB body limit axum applies by default.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Data root holding `data/` and `logs/`.
    pub root: PathBuf,
    pub bind: String,
    /// Used when `data/config.json` is absent or has no `playbooks_dir`.
    pub default_playbooks_dir: PathBuf,
    /// Inventory file edited from the settings page, unless `data/config.json`
    /// overrides it with `hosts_file`.
    pub hosts_file: PathBuf,
    pub ansible_bin: String,
    pub max_log_lines: usize,
    pub run_timeout_secs: u64,
    /// Largest history file accepted by the import route.
    pub max_upload_bytes: usize,
    /// `EnvFilter` directive; `PLAYDECK_LOG` overrides it at startup.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            bind: DEFAULT_BIND.to_string(),
            default_playbooks_dir: PathBuf::from(DEFAULT_PLAYBOOKS_DIR),
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            ansible_bin: DEFAULT_ANSIBLE_BIN.to_string(),
            max_log_lines: DEFAULT_MAX_LINES,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `explicit` (must exist) or `./playdeck.toml` (optional),
    /// then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self, DeckError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let implicit = Path::new(CONFIG_FILE_NAME);
                if implicit.exists() {
                    Self::from_file(implicit)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, DeckError> {
        let content = fs::read_to_string(path).map_err(|e| {
            DeckError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| DeckError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, DeckError> {
        toml::from_str(content).map_err(|e| DeckError::ConfigError(e.to_string()))
    }

    /// Apply `PLAYDECK_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), DeckError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PLAYDECK_ROOT") {
            self.root = PathBuf::from(v);
        }
        if let Some(v) = lookup("PLAYDECK_BIND") {
            self.bind = v;
        }
        if let Some(v) = lookup("PLAYDECK_PLAYBOOKS_DIR") {
            self.default_playbooks_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PLAYDECK_HOSTS_FILE") {
            self.hosts_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("PLAYDECK_ANSIBLE_BIN") {
            self.ansible_bin = v;
        }
        if let Some(v) = lookup("PLAYDECK_MAX_LOG_LINES") {
            self.max_log_lines = parse_number("PLAYDECK_MAX_LOG_LINES", &v)?;
        }
        if let Some(v) = lookup("PLAYDECK_RUN_TIMEOUT_SECS") {
            self.run_timeout_secs = parse_number("PLAYDECK_RUN_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("PLAYDECK_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_number("PLAYDECK_MAX_UPLOAD_BYTES", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DeckError> {
        if self.bind.trim().is_empty() {
            return Err(DeckError::ConfigError("bind address is empty".to_string()));
        }
        if self.max_log_lines == 0 {
            return Err(DeckError::ConfigError(
                "max_log_lines must be at least 1".to_string(),
            ));
        }
        if self.run_timeout_secs == 0 {
            return Err(DeckError::ConfigError(
                "run_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(DeckError::ConfigError(
                "max_upload_bytes must be at least 1".to_string(),
            ));
        }
        if self.ansible_bin.trim().is_empty() {
            return Err(DeckError::ConfigError("ansible_bin is empty".to_string()));
        }
        Ok(())
    }

    pub fn store(&self) -> Store {
        Store::new(&self.root)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DeckError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| DeckError::ConfigError(format!("{key} must be a number, got '{value}'")))
}
