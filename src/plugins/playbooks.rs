//! Playbook catalog: listing, reading and running playbooks from one directory.
//!
//! Every show and run is recorded in the history ledger. A ledger write
//! failure is logged and never hides the playbook's result from the caller.

use crate::core::error::DeckError;
use crate::core::external_action::{PlaybookExecutor, RunOutcome};
use crate::core::time::now_history_stamp;
use crate::plugins::history::{Action, HistoryLedger, HistoryRecord};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const PLAYBOOK_EXTENSIONS: [&str; 2] = ["yml", "yaml"];
pub const NO_OUTPUT: &str = "No output produced.";

#[derive(Debug, Clone)]
pub struct PlaybookCatalog {
    dir: PathBuf,
}

impl PlaybookCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sorted names of the regular `.yml`/`.yaml` files in the directory.
    pub fn list(&self) -> Result<Vec<String>, DeckError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| self.dir_error(e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if is_playbook(&path) && path.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn dir_error(&self, err: io::Error) -> DeckError {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => DeckError::NotFound(
                format!("Playbooks directory '{}' does not exist", self.dir.display()),
            ),
            io::ErrorKind::PermissionDenied => DeckError::PermissionDenied(format!(
                "Insufficient permissions for the playbooks directory '{}'. \
                 Ensure the directory is readable by the current user.",
                self.dir.display()
            )),
            _ => DeckError::IoError(err),
        }
    }

    /// Map a playbook name to its path. Names are bare file names.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, DeckError> {
        if name.is_empty() {
            return Err(DeckError::ValidationError(
                "No playbook specified".to_string(),
            ));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(DeckError::ValidationError(format!(
                "Invalid playbook name '{name}'"
            )));
        }
        let path = self.dir.join(name);
        if !path.exists() {
            return Err(DeckError::NotFound("Playbook does not exist".to_string()));
        }
        Ok(path)
    }

    pub fn read(&self, name: &str) -> Result<String, DeckError> {
        let path = self.resolve(name)?;
        fs::read_to_string(&path).map_err(|e| DeckError::access(&path, e))
    }

    /// Return the playbook's content and record a `show` entry.
    pub fn show(&self, name: &str, ledger: &HistoryLedger) -> Result<String, DeckError> {
        let content = self.read(name)?;
        record(ledger, HistoryRecord::new(Action::Show, name, &content, now_history_stamp()));
        tracing::info!("Displayed playbook: {}", name);
        Ok(content)
    }

    /// Run the playbook and record a `run` entry whatever the result.
    ///
    /// Spawn and I/O failures come back as an unsuccessful [`RunOutcome`];
    /// a timeout is recorded and then returned as [`DeckError::TimedOut`].
    pub fn run(
        &self,
        name: &str,
        executor: &dyn PlaybookExecutor,
        inventory: Option<&Path>,
        ledger: &HistoryLedger,
    ) -> Result<RunOutcome, DeckError> {
        let path = self.resolve(name)?;
        tracing::info!("Running playbook: {}", name);

        let (mut outcome, timed_out) = match executor.run(&path, inventory) {
            Ok(outcome) => (outcome, None),
            Err(err @ DeckError::TimedOut { .. }) => (
                RunOutcome {
                    output: format!("Playbook run did not finish: {err}"),
                    exit_code: None,
                    success: false,
                },
                Some(err),
            ),
            Err(err) => {
                tracing::error!("Error running playbook {}: {}", name, err);
                (
                    RunOutcome {
                        output: format!("Unexpected error occurred: {err}"),
                        exit_code: None,
                        success: false,
                    },
                    None,
                )
            }
        };
        if outcome.output.trim().is_empty() {
            outcome.output = NO_OUTPUT.to_string();
        }

        record(
            ledger,
            HistoryRecord::new(Action::Run, name, &outcome.output, now_history_stamp()),
        );
        match timed_out {
            Some(err) => Err(err),
            None => {
                tracing::info!(
                    exit_code = ?outcome.exit_code,
                    "Playbook {} finished",
                    name
                );
                Ok(outcome)
            }
        }
    }
}

fn is_playbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| PLAYBOOK_EXTENSIONS.contains(&ext))
}

fn record(ledger: &HistoryLedger, entry: HistoryRecord) {
    if let Err(err) = ledger.append(entry) {
        tracing::error!("Error saving history: {}", err);
    }
}

#[derive(Parser, Debug)]
#[clap(name = "playbooks", about = "List, show or run playbooks")]
pub struct PlaybooksCli {
    #[clap(subcommand)]
    pub command: PlaybooksCommand,
}

#[derive(Subcommand, Debug)]
pub enum PlaybooksCommand {
    /// List playbooks in the configured directory.
    List,
    /// Print a playbook (recorded in history).
    Show { name: String },
    /// Run a playbook and print its combined output (recorded in history).
    Run { name: String },
}

pub fn run_playbooks_cli(
    catalog: &PlaybookCatalog,
    executor: &dyn PlaybookExecutor,
    inventory: Option<&Path>,
    ledger: &HistoryLedger,
    cli: PlaybooksCli,
) -> Result<(), DeckError> {
    match cli.command {
        PlaybooksCommand::List => {
            let names = catalog.list()?;
            if names.is_empty() {
                println!(
                    "{}",
                    format!("No playbooks in {}", catalog.dir().display()).dimmed()
                );
            }
            for name in names {
                println!("{}", name);
            }
        }
        PlaybooksCommand::Show { name } => {
            print!("{}", catalog.show(&name, ledger)?);
        }
        PlaybooksCommand::Run { name } => {
            let outcome = catalog.run(&name, executor, inventory, ledger)?;
            print!("{}", outcome.output);
            let status = match outcome.exit_code {
                Some(code) => format!("exit {}", code),
                None => "no exit code".to_string(),
            };
            if outcome.success {
                eprintln!("{} {}", "ok".green().bold(), status);
            } else {
                eprintln!("{} {}", "failed".red().bold(), status);
            }
        }
    }
    Ok(())
}
