use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("Failed to parse {path}: {message}")]
    ParseError { path: PathBuf, message: String },
    #[error("Failed to persist {path}: {source}")]
    PersistError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unsupported file type: {0}. Only .json and .csv allowed.")]
    FormatError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Timed out after {}s: {command}", .after.as_secs())]
    TimedOut { command: String, after: Duration },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

impl DeckError {
    /// Classify a write failure on `path`, keeping permission problems distinct.
    pub fn persist(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::PermissionDenied {
            return DeckError::PermissionDenied(path.display().to_string());
        }
        DeckError::PersistError { path, source }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        DeckError::ParseError {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Classify a read/open failure on `path` into NotFound / PermissionDenied / I/O.
    pub fn access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => DeckError::NotFound(path.display().to_string()),
            io::ErrorKind::PermissionDenied => {
                DeckError::PermissionDenied(path.display().to_string())
            }
            _ => DeckError::IoError(source),
        }
    }
}
