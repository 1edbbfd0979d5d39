//! playdeck: a small web front end for running automation playbooks.
//!
//! An operator lists, inspects and runs playbooks from one directory, keeps
//! an exportable history of those actions, and edits the inventory file,
//! all without a shell on the host.
//!
//! # Architecture
//!
//! Three persistence primitives carry all state:
//!
//! - [`core::document::DocumentStore`]: one JSON document per file,
//!   replaced atomically, defaults on absence or corruption.
//! - [`core::rotating_log::RotatingLog`]: a newest-first text log holding
//!   at most N lines; every `tracing` event lands there.
//! - [`plugins::history::HistoryLedger`]: the ordered record of run and
//!   show actions, with JSON/CSV export and import.
//!
//! Writers to the same file serialize on a per-path lock
//! ([`core::pool`]), so concurrent requests never lose records or lines.
//!
//! # Data root
//!
//! ```text
//! <root>/data/config.json    operator settings (playbooks_dir, hosts_file)
//! <root>/data/history.json   history ledger
//! <root>/logs/app.log        rotating log, newest line first
//! ```
//!
//! # Examples
//!
//! ```bash
//! # Serve the web front end
//! playdeck serve --bind 127.0.0.1:5000
//!
//! # Run a playbook from the terminal (recorded in history)
//! playdeck playbooks run site.yml
//!
//! # Export history as CSV
//! playdeck history export --format csv --out history.csv
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: persistence, logging, configuration, process execution
//! - [`plugins`]: history, settings, playbooks, system status
//! - [`web`]: the HTTP surface

pub mod core;
pub mod plugins;
pub mod web;

use crate::core::{
    config::AppConfig, error::DeckError, external_action::AnsibleExecutor, logging,
    rotating_log::RotatingLog,
};
use crate::plugins::{
    history::{self, HistoryCli, HistoryLedger},
    playbooks::{self, PlaybookCatalog, PlaybooksCli},
    settings::{self, ConfigStore, SettingsCli, explicit_inventory},
};

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(
    name = "playdeck",
    version = env!("CARGO_PKG_VERSION"),
    about = "Browse, inspect and run automation playbooks"
)]
struct Cli {
    /// Config file (default: ./playdeck.toml when present).
    #[clap(long, global = true, env = "PLAYDECK_CONFIG")]
    config: Option<PathBuf>,
    /// Data root holding data/ and logs/. Wins over config and PLAYDECK_ROOT.
    #[clap(long, global = true)]
    root: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct LogCli {
    #[clap(subcommand)]
    command: LogCommand,
}

#[derive(Subcommand, Debug)]
enum LogCommand {
    /// Print the newest log lines, newest first.
    Tail {
        #[clap(short = 'n', long, default_value_t = 20)]
        lines: usize,
    },
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the web front end.
    Serve {
        /// Listen address (default from config, e.g. 0.0.0.0:5000).
        #[clap(long)]
        bind: Option<String>,
    },
    /// Execution history.
    History(HistoryCli),
    /// Operator settings.
    Settings(SettingsCli),
    /// Playbooks in the configured directory.
    Playbooks(PlaybooksCli),
    /// The rotating application log.
    Log(LogCli),
    /// Print the version.
    Version,
}

pub fn run() -> Result<(), DeckError> {
    let cli = Cli::parse();
    if matches!(cli.command, Command::Version) {
        // Version command - simple output for scripts/parsing
        println!("v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.root = root;
    }
    let store = config.store();
    let log = Arc::new(RotatingLog::initialize(
        store.log_path(),
        config.max_log_lines,
    )?);
    logging::init(Arc::clone(&log), &config.log_filter);

    let settings = ConfigStore::new(store.config_path(), &config.default_playbooks_dir);
    let ledger = HistoryLedger::new(store.history_path());

    match cli.command {
        Command::Serve { bind } => serve(config, log, bind),
        Command::History(history_cli) => history::run_history_cli(&ledger, history_cli),
        Command::Settings(settings_cli) => {
            settings::run_settings_cli(&settings, &config.hosts_file, settings_cli)
        }
        Command::Playbooks(playbooks_cli) => {
            let catalog = PlaybookCatalog::new(settings.playbooks_dir());
            let executor = AnsibleExecutor::new(config.ansible_bin.clone(), config.run_timeout());
            let hosts = settings.hosts_file(&config.hosts_file);
            playbooks::run_playbooks_cli(
                &catalog,
                &executor,
                explicit_inventory(&hosts),
                &ledger,
                playbooks_cli,
            )
        }
        Command::Log(log_cli) => match log_cli.command {
            LogCommand::Tail { lines } => {
                for line in log.lines().into_iter().take(lines) {
                    println!("{}", colorize_level(&line));
                }
                Ok(())
            }
        },
        Command::Version => Ok(()),
    }
}

fn colorize_level(line: &str) -> String {
    if line.contains(" ERROR: ") {
        line.red().to_string()
    } else if line.contains(" WARN: ") {
        line.yellow().to_string()
    } else {
        line.to_string()
    }
}

fn serve(config: AppConfig, log: Arc<RotatingLog>, bind: Option<String>) -> Result<(), DeckError> {
    let bind = bind.unwrap_or_else(|| config.bind.clone());
    let state = web::AppState::new(config, log);
    state.bootstrap()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(web::serve(state, &bind))
}
