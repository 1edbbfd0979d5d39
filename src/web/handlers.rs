use crate::core::error::DeckError;
use crate::plugins::history::LedgerFormat;
use crate::plugins::playbooks::PlaybookCatalog;
use crate::plugins::system;
use crate::web::AppState;
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Form, Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub const DARK_MODE_COOKIE: &str = "dark_mode";

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<DeckError> for ApiError {
    fn from(err: DeckError) -> Self {
        Self::new(status_for(&err), user_message(&err))
    }
}

#[must_use]
pub fn status_for(err: &DeckError) -> StatusCode {
    match err {
        DeckError::NotFound(_) => StatusCode::NOT_FOUND,
        DeckError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        DeckError::ValidationError(_)
        | DeckError::FormatError(_)
        | DeckError::ParseError { .. } => StatusCode::BAD_REQUEST,
        DeckError::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn user_message(err: &DeckError) -> String {
    match err {
        DeckError::NotFound(m) | DeckError::PermissionDenied(m) | DeckError::ValidationError(m) => {
            m.clone()
        }
        DeckError::ParseError { .. } => format!("Error processing file: {err}"),
        other => other.to_string(),
    }
}

/// Log a failed request and turn it into its HTTP response.
fn fail(context: &str, err: DeckError) -> ApiError {
    tracing::error!("{}: {}", context, err);
    ApiError::from(err)
}

fn join_failed(context: &str, err: tokio::task::JoinError) -> ApiError {
    tracing::error!("{}: {}", context, err);
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, context)
}

/// Reject an import request, logging why.
fn bad_upload(message: &str) -> ApiError {
    tracing::error!("Error importing history: {}", message);
    ApiError::new(StatusCode::BAD_REQUEST, message)
}

fn upload_failed(err: MultipartError, limit: usize) -> ApiError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::error!(
            "Error importing history: upload exceeds the {} byte limit",
            limit
        );
        return ApiError::new(
            status,
            format!("File too large: uploads are limited to {limit} bytes"),
        );
    }
    tracing::error!("Error importing history: malformed upload: {}", err);
    ApiError::new(StatusCode::BAD_REQUEST, format!("Malformed upload: {err}"))
}

/// True when the request carries `dark_mode=1`.
pub fn dark_mode(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(k, v)| k == DARK_MODE_COOKIE && v == "1")
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaybookForm {
    pub playbook: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaybooksDirForm {
    pub playbooks_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HostsForm {
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

pub async fn dashboard_handler(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let playbooks_dir = state.settings.playbooks_dir();
    let (playbooks, error, prompt_for_dir) = match PlaybookCatalog::new(&playbooks_dir).list() {
        Ok(list) => (list, None, false),
        Err(DeckError::NotFound(_)) => {
            tracing::warn!(
                "Playbooks directory does not exist: {}",
                playbooks_dir.display()
            );
            (Vec::new(), None, true)
        }
        Err(DeckError::PermissionDenied(message)) => {
            tracing::error!("{}", message);
            (Vec::new(), Some(message), false)
        }
        Err(err) => {
            tracing::error!("Error listing playbooks: {}", err);
            (
                Vec::new(),
                Some("An error occurred while accessing the playbooks directory.".to_string()),
                false,
            )
        }
    };
    Json(json!({
        "playbooks": playbooks,
        "error": error,
        "prompt_for_dir": prompt_for_dir,
        "playbooks_dir": playbooks_dir.display().to_string(),
        "dark_mode": dark_mode(&headers),
    }))
}

fn playbook_name(form: Option<Form<PlaybookForm>>, route: &str) -> Result<String, ApiError> {
    match form.and_then(|Form(f)| f.playbook) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => {
            tracing::error!("No playbook specified in {}", route);
            Err(ApiError::new(StatusCode::BAD_REQUEST, "No playbook specified"))
        }
    }
}

pub async fn run_playbook_handler(
    State(state): State<AppState>,
    form: Option<Form<PlaybookForm>>,
) -> Result<Json<Value>, ApiError> {
    let name = playbook_name(form, "run_playbook")?;
    let catalog = state.catalog();
    let ledger = Arc::clone(&state.ledger);
    let executor = Arc::clone(&state.executor);
    let inventory = state.run_inventory();

    let outcome = tokio::task::spawn_blocking(move || {
        catalog.run(&name, executor.as_ref(), inventory.as_deref(), &ledger)
    })
    .await
    .map_err(|e| join_failed("Error running playbook", e))?
    .map_err(|e| fail("Error running playbook", e))?;

    Ok(Json(json!({
        "output": outcome.output,
        "exit_code": outcome.exit_code,
        "success": outcome.success,
    })))
}

pub async fn show_playbook_handler(
    State(state): State<AppState>,
    form: Option<Form<PlaybookForm>>,
) -> Result<Json<Value>, ApiError> {
    let name = playbook_name(form, "show_playbook")?;
    let content = state
        .catalog()
        .show(&name, &state.ledger)
        .map_err(|e| fail("Error reading playbook", e))?;
    Ok(Json(json!({ "content": content })))
}

pub async fn history_page_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Value> {
    Json(json!({
        "history": state.ledger.list_all(),
        "dark_mode": dark_mode(&headers),
    }))
}

/// Anything other than `format=csv` exports JSON.
pub async fn export_history_handler(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = match query.format.as_deref() {
        Some("csv") => LedgerFormat::Csv,
        _ => LedgerFormat::Json,
    };
    let body = state
        .ledger
        .export(format)
        .map_err(|e| fail("Error exporting history", e))?;
    tracing::info!("History exported as {}", format.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type()),
            (header::CONTENT_DISPOSITION, format.content_disposition()),
        ],
        body,
    )
        .into_response())
}

pub async fn import_history_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let limit = state.config.max_upload_bytes;
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_failed(e, limit))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| upload_failed(e, limit))?;
        upload = Some((file_name, data));
        break;
    }

    let Some((file_name, data)) = upload else {
        return Err(bad_upload("No file provided"));
    };
    if file_name.is_empty() {
        return Err(bad_upload("Empty file name"));
    }

    let imported = state
        .ledger
        .import_file(&file_name, &data)
        .map_err(|e| fail("Error importing history", e))?;
    Ok(Json(json!({
        "status": "ok",
        "message": "History imported successfully.",
        "imported": imported,
    })))
}

pub async fn settings_page_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Value> {
    Json(json!({
        "playbooks_dir": state.settings.playbooks_dir().display().to_string(),
        "hosts_file": state.hosts_path().display().to_string(),
        "dark_mode": dark_mode(&headers),
    }))
}

pub async fn update_playbooks_dir_handler(
    State(state): State<AppState>,
    form: Option<Form<PlaybooksDirForm>>,
) -> Result<Json<Value>, ApiError> {
    let dir = form.and_then(|Form(f)| f.playbooks_dir).unwrap_or_default();
    state
        .settings
        .update_playbooks_dir(&dir)
        .map_err(|e| fail("Error updating playbooks directory", e))?;
    Ok(Json(json!({
        "status": "ok",
        "message": "Playbooks directory updated successfully",
    })))
}

pub async fn get_hosts_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let inventory = state.inventory();
    match inventory.read() {
        Ok(content) => {
            tracing::info!("Hosts file read successfully");
            Ok(Json(json!({ "content": content })))
        }
        Err(DeckError::PermissionDenied(_)) => {
            tracing::error!(
                "Read permission denied for hosts file: {}",
                inventory.path().display()
            );
            Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "Add read permission to user to file",
            ))
        }
        Err(DeckError::NotFound(_)) => {
            tracing::error!("Hosts file not found: {}", inventory.path().display());
            Err(ApiError::new(StatusCode::NOT_FOUND, "Hosts file not found"))
        }
        Err(err) => Err(fail("Error reading hosts file", err)),
    }
}

pub async fn save_hosts_handler(
    State(state): State<AppState>,
    form: Option<Form<HostsForm>>,
) -> Result<Json<Value>, ApiError> {
    let content = form.and_then(|Form(f)| f.content).unwrap_or_default();
    let inventory = state.inventory();
    match inventory.write(&content) {
        Ok(()) => {
            tracing::info!("Hosts file updated successfully");
            Ok(Json(json!({
                "status": "ok",
                "message": "Hosts file updated successfully",
            })))
        }
        Err(DeckError::PermissionDenied(_)) => {
            tracing::error!(
                "Write permission denied for hosts file: {}",
                inventory.path().display()
            );
            Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "Please add write permission to host file",
            ))
        }
        Err(DeckError::NotFound(_)) => {
            tracing::error!("Hosts file not found: {}", inventory.path().display());
            Err(ApiError::new(StatusCode::NOT_FOUND, "Hosts file not found"))
        }
        Err(err) => Err(fail("Error saving hosts file", err)),
    }
}

pub async fn system_status_handler() -> Result<Json<Value>, ApiError> {
    let status = tokio::task::spawn_blocking(system::sample)
        .await
        .map_err(|e| join_failed("Error fetching system status", e))?;
    tracing::info!(
        "System status: CPU {}%, Memory {}%",
        status.cpu,
        status.memory
    );
    Ok(Json(json!({ "cpu": status.cpu, "memory": status.memory })))
}

pub async fn clear_history_handler(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .ledger
        .clear()
        .map_err(|e| fail("Error clearing history", e))?;
    tracing::info!("History cleared");
    Ok(Json(json!({ "status": "ok" })))
}

pub async fn toggle_dark_mode_handler(headers: HeaderMap) -> impl IntoResponse {
    let enabled = !dark_mode(&headers);
    let cookie = format!(
        "{}={}; Path=/; SameSite=Lax",
        DARK_MODE_COOKIE,
        if enabled { 1 } else { 0 }
    );
    tracing::info!("Dark mode toggled to {}", enabled);
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "dark_mode": enabled })),
    )
}

pub async fn logs_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "max_lines": state.log.max_lines(),
        "lines": state.log.lines(),
    }))
}
