// REST API with Axum
// Thin CRUD over the store plus the output preview, clear and export download

use crate::config::{AppConfig, ContractConstants};
use crate::db;
use crate::error::BillingError;
use crate::export::{self, stage};
use crate::models::{
    billing_week, BillingEntry, NewRecipient, NewSchedule, RawBillingEntry, Recipient,
    ScheduleEntry,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use futures::StreamExt;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Actor recorded in the audit trail for API writes
const API_ACTOR: &str = "api";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub contract: Arc<ContractConstants>,
    pub staging_dir: Option<PathBuf>,
    /// Source of the processing date stamped on records
    pub today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl AppState {
    pub fn new(conn: Connection, config: &AppConfig) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            contract: Arc::new(config.contract.clone()),
            staging_dir: config.export.staging_dir.clone(),
            today: local_today,
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Handler failure mapped onto an HTTP status
#[derive(Debug)]
pub enum ApiError {
    Billing(BillingError),
    Internal(String),
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError::Billing(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Billing(err) => {
                let status = match &err {
                    BillingError::NotFound { .. } => StatusCode::NOT_FOUND,
                    BillingError::MalformedEntry { .. } => StatusCode::BAD_REQUEST,
                    e if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, error = %message, "Request failed");
        }

        (status, Json(ApiResponse::error(message))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Request / Response types
// ============================================================================

/// Billing input body: a bare list or `{"entries": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum BillingInput {
    Wrapped { entries: Vec<RawBillingEntry> },
    Bare(Vec<RawBillingEntry>),
}

impl BillingInput {
    fn into_entries(self) -> Vec<RawBillingEntry> {
        match self {
            BillingInput::Wrapped { entries } | BillingInput::Bare(entries) => entries,
        }
    }
}

#[derive(Serialize)]
struct SaveResponse {
    status: &'static str,
    stored: usize,
}

#[derive(Serialize)]
struct ClearResponse {
    status: &'static str,
    removed: usize,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/recipients
async fn get_recipients(State(state): State<AppState>) -> ApiResult<Json<Vec<Recipient>>> {
    let conn = state.conn()?;
    Ok(Json(db::list_recipients(&conn)?))
}

/// POST /api/recipients
async fn add_recipient(
    State(state): State<AppState>,
    Json(payload): Json<NewRecipient>,
) -> ApiResult<(StatusCode, Json<Recipient>)> {
    let conn = state.conn()?;
    let recipient = db::insert_recipient(&conn, payload, API_ACTOR)?;
    Ok((StatusCode::CREATED, Json(recipient)))
}

/// DELETE /api/recipients/:id
async fn remove_recipient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let conn = state.conn()?;
    db::delete_recipient(&conn, id, API_ACTOR)?;
    Ok(Json(ApiResponse::ok("deleted")))
}

/// GET /api/schedules
async fn get_schedules(State(state): State<AppState>) -> ApiResult<Json<Vec<ScheduleEntry>>> {
    let conn = state.conn()?;
    Ok(Json(db::list_schedules(&conn)?))
}

/// POST /api/schedules
async fn add_schedule(
    State(state): State<AppState>,
    Json(payload): Json<NewSchedule>,
) -> ApiResult<(StatusCode, Json<ScheduleEntry>)> {
    let conn = state.conn()?;
    let schedule = db::insert_schedule(&conn, payload)?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// DELETE /api/schedules/:id
async fn remove_schedule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let conn = state.conn()?;
    db::delete_schedule(&conn, id)?;
    Ok(Json(ApiResponse::ok("deleted")))
}

/// POST /api/billing-input
async fn billing_input(
    State(state): State<AppState>,
    Json(payload): Json<BillingInput>,
) -> ApiResult<Json<SaveResponse>> {
    let conn = state.conn()?;
    let stored = db::insert_billing_entries(&conn, payload.into_entries())?;
    Ok(Json(SaveResponse {
        status: "saved",
        stored,
    }))
}

/// GET /api/billing-entries
async fn get_billing_entries(State(state): State<AppState>) -> ApiResult<Json<Vec<BillingEntry>>> {
    let conn = state.conn()?;
    Ok(Json(db::list_billing_entries(&conn)?))
}

/// GET /api/billing-week/:monday - The five dates of a service week
async fn get_billing_week(Path(monday): Path<String>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(billing_week(&monday)?))
}

/// GET /api/output - Preview of the encoded records
async fn get_output(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    let conn = state.conn()?;
    let entries = db::list_billing_entries(&conn)?;
    let recipients = db::list_recipients(&conn)?;
    let report = export::generate_lines(&entries, &recipients, (state.today)(), &state.contract);
    Ok(Json(report.lines))
}

/// DELETE /api/output - Clear all billing entries
async fn clear_output(State(state): State<AppState>) -> ApiResult<Json<ClearResponse>> {
    let conn = state.conn()?;
    let removed = db::clear_billing_entries(&conn, API_ACTOR)?;
    Ok(Json(ClearResponse {
        status: "cleared",
        removed,
    }))
}

/// GET /api/export - Download the intake file
///
/// The file is staged in a temporary file owned by the response stream, so
/// it is removed once the body is dropped: after the transfer, when the
/// client goes away, or on a read error.
async fn download_export(State(state): State<AppState>) -> ApiResult<Response> {
    let file = {
        let conn = state.conn()?;
        let entries = db::list_billing_entries(&conn)?;
        let recipients = db::list_recipients(&conn)?;
        export::export(&entries, &recipients, (state.today)(), &state.contract)
    };

    let staged = stage(&file, state.staging_dir.as_deref())?;
    let temp_path = staged.into_temp_path();
    let reader = tokio::fs::File::open(&temp_path)
        .await
        .map_err(BillingError::from)?;

    // Only a file that is about to be sent goes into the audit trail
    db::record_export(&*state.conn()?, &file, API_ACTOR)?;

    let stream = ReaderStream::new(reader).map(move |chunk| {
        let _staged = &temp_path;
        chunk
    });

    info!(filename = %file.filename, bytes = file.content.len(), "Streaming billing export");

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

// ============================================================================
// Router
// ============================================================================

/// Build the application router with every route under `/api`
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/recipients", get(get_recipients).post(add_recipient))
        .route("/recipients/:id", delete(remove_recipient))
        .route("/schedules", get(get_schedules).post(add_schedule))
        .route("/schedules/:id", delete(remove_schedule))
        .route("/billing-input", post(billing_input))
        .route("/billing-entries", get(get_billing_entries))
        .route("/billing-week/:monday", get(get_billing_week))
        .route("/output", get(get_output).delete(clear_output))
        .route("/export", get(download_export))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
