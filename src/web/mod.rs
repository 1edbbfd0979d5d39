//! HTTP surface.
//!
//! Every page is served as a JSON view model; the front end renders it.
//! Handlers share one [`AppState`], and the blocking parts of a request
//! (playbook runs, the CPU sample) move to the blocking thread pool.

pub mod handlers;

use crate::core::config::AppConfig;
use crate::core::error::DeckError;
use crate::core::external_action::{AnsibleExecutor, PlaybookExecutor};
use crate::core::rotating_log::RotatingLog;
use crate::plugins::history::HistoryLedger;
use crate::plugins::playbooks::PlaybookCatalog;
use crate::plugins::settings::{ConfigStore, InventoryFile, explicit_inventory};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub settings: Arc<ConfigStore>,
    pub ledger: Arc<HistoryLedger>,
    pub log: Arc<RotatingLog>,
    pub executor: Arc<dyn PlaybookExecutor>,
}

impl AppState {
    pub fn new(config: AppConfig, log: Arc<RotatingLog>) -> Self {
        let store = config.store();
        let executor = AnsibleExecutor::new(config.ansible_bin.clone(), config.run_timeout());
        Self {
            settings: Arc::new(ConfigStore::new(
                store.config_path(),
                &config.default_playbooks_dir,
            )),
            ledger: Arc::new(HistoryLedger::new(store.history_path())),
            executor: Arc::new(executor),
            config: Arc::new(config),
            log,
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn PlaybookExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Create the settings document and an empty ledger if they are missing.
    pub fn bootstrap(&self) -> Result<(), DeckError> {
        if self.settings.ensure_initialized()? {
            tracing::info!(path = %self.settings.path().display(), "Created settings document");
        }
        if self.ledger.ensure_initialized()? {
            tracing::info!(path = %self.ledger.path().display(), "Created history ledger");
        }
        Ok(())
    }

    pub fn catalog(&self) -> PlaybookCatalog {
        PlaybookCatalog::new(self.settings.playbooks_dir())
    }

    pub fn hosts_path(&self) -> PathBuf {
        self.settings.hosts_file(&self.config.hosts_file)
    }

    pub fn inventory(&self) -> InventoryFile {
        InventoryFile::new(self.hosts_path())
    }

    pub fn run_inventory(&self) -> Option<PathBuf> {
        let path = self.hosts_path();
        explicit_inventory(&path).map(Path::to_path_buf)
    }
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(handlers::dashboard_handler))
        .route("/run_playbook", post(handlers::run_playbook_handler))
        .route("/show_playbook", post(handlers::show_playbook_handler))
        .route("/history", get(handlers::history_page_handler))
        .route("/history/", get(handlers::history_page_handler))
        .route(
            "/history/export_history",
            get(handlers::export_history_handler),
        )
        .route(
            "/history/import_history",
            post(handlers::import_history_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/settings", get(handlers::settings_page_handler))
        .route("/settings/", get(handlers::settings_page_handler))
        .route(
            "/settings/update_playbooks_dir",
            post(handlers::update_playbooks_dir_handler),
        )
        .route("/settings/get_hosts", get(handlers::get_hosts_handler))
        .route("/settings/save_hosts", post(handlers::save_hosts_handler))
        .route(
            "/settings/system_status",
            get(handlers::system_status_handler),
        )
        .route(
            "/settings/clear_history",
            post(handlers::clear_history_handler),
        )
        .route(
            "/settings/toggle_dark_mode",
            post(handlers::toggle_dark_mode_handler),
        )
        .route("/settings/logs", get(handlers::logs_handler))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> Result<(), DeckError> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "playdeck listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("playdeck stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
