//! History ledger: every run and show action, oldest first.
//!
//! The ledger is a single JSON array on disk. Records are loosely typed
//! string maps so that imported rows with unfamiliar columns survive a
//! round trip; records written by playdeck itself always carry
//! `action`, `playbook`, `output` and `time`.

use crate::core::document::DocumentStore;
use crate::core::error::DeckError;
use crate::core::output::{column, output_preview};
use crate::core::time::cli_envelope;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Column order of a CSV export.
pub const CSV_HEADER: [&str; 4] = ["time", "playbook", "action", "output"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Run,
    Show,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Run => "run",
            Action::Show => "show",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution event. Serializes as a flat JSON object with keys in
/// lexicographic order; non-string values read from disk are stringified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct HistoryRecord(BTreeMap<String, String>);

impl From<BTreeMap<String, Value>> for HistoryRecord {
    fn from(raw: BTreeMap<String, Value>) -> Self {
        Self(
            raw.into_iter()
                .map(|(k, v)| (k, value_to_string(v)))
                .collect(),
        )
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl HistoryRecord {
    pub fn new(
        action: Action,
        playbook: impl Into<String>,
        output: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self::from_fields([
            ("action", action.as_str().to_string()),
            ("playbook", playbook.into()),
            ("output", output.into()),
            ("time", time.into()),
        ])
    }

    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn action(&self) -> Option<&str> {
        self.get("action")
    }

    pub fn playbook(&self) -> Option<&str> {
        self.get("playbook")
    }

    pub fn output(&self) -> Option<&str> {
        self.get("output")
    }

    pub fn time(&self) -> Option<&str> {
        self.get("time")
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Wire format of an export or import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerFormat {
    Json,
    Csv,
}

impl LedgerFormat {
    /// Pick the import format from an uploaded file name. Only the `.json`
    /// and `.csv` suffixes are accepted.
    pub fn from_file_name(name: &str) -> Result<Self, DeckError> {
        if name.ends_with(".json") {
            Ok(LedgerFormat::Json)
        } else if name.ends_with(".csv") {
            Ok(LedgerFormat::Csv)
        } else {
            Err(DeckError::FormatError(name.to_string()))
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            LedgerFormat::Json => "application/json",
            LedgerFormat::Csv => "text/csv",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            LedgerFormat::Json => "history.json",
            LedgerFormat::Csv => "history.csv",
        }
    }

    pub fn content_disposition(self) -> &'static str {
        match self {
            LedgerFormat::Json => "attachment;filename=history.json",
            LedgerFormat::Csv => "attachment;filename=history.csv",
        }
    }
}

impl FromStr for LedgerFormat {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LedgerFormat::Json),
            "csv" => Ok(LedgerFormat::Csv),
            other => Err(DeckError::FormatError(other.to_string())),
        }
    }
}

pub struct HistoryLedger {
    docs: DocumentStore<Vec<HistoryRecord>>,
}

impl HistoryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            docs: DocumentStore::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        self.docs.path()
    }

    /// Write an empty ledger if none exists yet. Returns true when created.
    pub fn ensure_initialized(&self) -> Result<bool, DeckError> {
        if self.path().exists() {
            return Ok(false);
        }
        self.docs.save(&Vec::new())?;
        Ok(true)
    }

    pub fn append(&self, record: HistoryRecord) -> Result<(), DeckError> {
        self.docs.update(Vec::new, |records| {
            records.push(record);
            Ok(())
        })?;
        Ok(())
    }

    /// Absent or corrupt ledgers read as empty.
    pub fn list_all(&self) -> Vec<HistoryRecord> {
        self.docs.load(Vec::new())
    }

    pub fn clear(&self) -> Result<(), DeckError> {
        self.docs.save(&Vec::new())
    }

    pub fn export(&self, format: LedgerFormat) -> Result<Vec<u8>, DeckError> {
        encode(&self.list_all(), format)
    }

    /// Replace the ledger with the decoded content of `bytes`. The ledger is
    /// untouched unless decoding succeeds. Returns the number of records.
    pub fn import(&self, bytes: &[u8], format: LedgerFormat) -> Result<usize, DeckError> {
        let records = decode(bytes, format, format.file_name())?;
        self.docs.save(&records)?;
        Ok(records.len())
    }

    /// Import an uploaded file, choosing the format from its name.
    pub fn import_file(&self, file_name: &str, bytes: &[u8]) -> Result<usize, DeckError> {
        let format = LedgerFormat::from_file_name(file_name)?;
        let records = decode(bytes, format, file_name)?;
        self.docs.save(&records)?;
        tracing::info!(file = file_name, records = records.len(), "History imported");
        Ok(records.len())
    }
}

pub fn encode(records: &[HistoryRecord], format: LedgerFormat) -> Result<Vec<u8>, DeckError> {
    match format {
        LedgerFormat::Json => serde_json::to_vec_pretty(records)
            .map_err(|e| DeckError::IoError(io::Error::other(e))),
        LedgerFormat::Csv => {
            let mut writer = csv::WriterBuilder::new()
                .terminator(csv::Terminator::CRLF)
                .from_writer(Vec::new());
            writer.write_record(CSV_HEADER).map_err(io::Error::from)?;
            for record in records {
                writer
                    .write_record(CSV_HEADER.iter().map(|f| record.get(f).unwrap_or("")))
                    .map_err(io::Error::from)?;
            }
            writer
                .into_inner()
                .map_err(|e| DeckError::IoError(io::Error::other(e.to_string())))
        }
    }
}

/// Decode an export. `origin` names the source in parse errors.
pub fn decode(
    bytes: &[u8],
    format: LedgerFormat,
    origin: &str,
) -> Result<Vec<HistoryRecord>, DeckError> {
    match format {
        LedgerFormat::Json => {
            serde_json::from_slice(bytes).map_err(|e| DeckError::parse(origin, e))
        }
        LedgerFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .flexible(true)
                .from_reader(bytes);
            let header = reader
                .headers()
                .map_err(|e| DeckError::parse(origin, e))?
                .clone();
            let mut records = Vec::new();
            for row in reader.records() {
                let row = row.map_err(|e| DeckError::parse(origin, e))?;
                // Short rows omit trailing columns; extra values are dropped.
                records.push(HistoryRecord::from_fields(header.iter().zip(row.iter())));
            }
            Ok(records)
        }
    }
}

#[derive(Parser, Debug)]
#[clap(name = "history", about = "Inspect, export, import or clear the execution history")]
pub struct HistoryCli {
    #[clap(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// List records, oldest first.
    List {
        /// Print the raw ledger as JSON.
        #[clap(long)]
        json: bool,
    },
    /// Export the ledger as json or csv.
    Export {
        #[clap(long, default_value = "json")]
        format: LedgerFormat,
        /// Write to this file instead of stdout.
        #[clap(long)]
        out: Option<PathBuf>,
    },
    /// Replace the ledger with a .json or .csv export.
    Import { file: PathBuf },
    /// Remove every record.
    Clear,
}

pub fn run_history_cli(ledger: &HistoryLedger, cli: HistoryCli) -> Result<(), DeckError> {
    match cli.command {
        HistoryCommand::List { json } => {
            let records = ledger.list_all();
            if json {
                let text = serde_json::to_string_pretty(&records).map_err(io::Error::other)?;
                println!("{}", text);
            } else {
                print_table(&records);
            }
        }
        HistoryCommand::Export { format, out } => {
            let bytes = ledger.export(format)?;
            match out {
                Some(path) => {
                    fs::write(&path, &bytes).map_err(|e| DeckError::persist(&path, e))?;
                    println!(
                        "{}",
                        cli_envelope(
                            "history.export",
                            "ok",
                            json!({ "format": format, "out": path.display().to_string() }),
                        )
                    );
                }
                None => io::stdout().write_all(&bytes)?,
            }
        }
        HistoryCommand::Import { file } => {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes = fs::read(&file).map_err(|e| DeckError::access(&file, e))?;
            let imported = ledger.import_file(&name, &bytes)?;
            println!(
                "{}",
                cli_envelope(
                    "history.import",
                    "ok",
                    json!({ "file": file.display().to_string(), "records": imported }),
                )
            );
        }
        HistoryCommand::Clear => {
            ledger.clear()?;
            tracing::info!("History cleared");
            println!("{}", cli_envelope("history.clear", "ok", json!({})));
        }
    }
    Ok(())
}

fn print_table(records: &[HistoryRecord]) {
    if records.is_empty() {
        println!("{}", "No history recorded.".dimmed());
        return;
    }
    println!(
        "{} {} {} {}",
        column("TIME", 30).bold(),
        column("ACTION", 8).bold(),
        column("PLAYBOOK", 24).bold(),
        "OUTPUT".bold()
    );
    for record in records {
        let action = column(record.action().unwrap_or("-"), 8);
        let action = match record.action() {
            Some("run") => action.green(),
            Some("show") => action.cyan(),
            _ => action.normal(),
        };
        println!(
            "{} {} {} {}",
            column(record.time().unwrap_or("-"), 30),
            action,
            column(record.playbook().unwrap_or("-"), 24),
            output_preview(record.output().unwrap_or(""), 60)
        );
    }
}
