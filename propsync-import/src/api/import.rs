//! WordPress import API handlers
//!
//! POST /api/wordpress-import/start, GET /api/wordpress-import/status,
//! POST /api/wordpress-import/reset

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use propsync_common::events::PropsyncEvent;

use crate::db::settings::ImportParameters;
use crate::error::{ApiError, ApiResult};
use crate::models::{CatalogStats, ImportStats, RunState};
use crate::services::{sql_source, ImportDriver};
use crate::AppState;

/// Settings key caching the record count of the last parsed export
const SOURCE_COUNT_KEY: &str = "source_record_count";

/// POST /api/wordpress-import/start request
#[derive(Debug, Default, Deserialize)]
pub struct StartImportRequest {
    /// Override the configured batch size for this run only
    pub batch_size: Option<u32>,
}

/// POST /api/wordpress-import/start response
#[derive(Debug, Serialize)]
pub struct StartImportResponse {
    pub state: RunState,
    pub resume_from_id: i64,
    pub batch_size: u32,
    pub retry_pending: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// GET /api/wordpress-import/status response
#[derive(Debug, Serialize)]
pub struct ImportStatusResponse {
    #[serde(flatten)]
    pub stats: ImportStats,
    pub catalog: CatalogStats,
}

/// POST /api/wordpress-import/reset response
#[derive(Debug, Serialize)]
pub struct ResetImportResponse {
    pub state: RunState,
    pub last_processed_id: i64,
    pub reset_at: chrono::DateTime<chrono::Utc>,
}

/// GET /api/wordpress-import/status
///
/// Checkpoint progress plus catalog aggregation. Cheap enough to poll.
pub async fn import_status(State(state): State<AppState>) -> ApiResult<Json<ImportStatusResponse>> {
    let checkpoint = crate::db::checkpoint::load_checkpoint(&state.db).await?;
    let catalog = crate::db::properties::catalog_stats(&state.db).await?;
    let total_catalog_records = crate::db::properties::count_properties(&state.db).await?;

    let total_source_records = crate::db::settings::get_setting(&state.db, SOURCE_COUNT_KEY)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let stats = ImportStats {
        run_state: checkpoint.run_state,
        last_processed_id: checkpoint.last_processed_id,
        total_processed: checkpoint.total_processed,
        total_failed: checkpoint.total_failed,
        total_source_records,
        total_catalog_records,
        retry_pending: checkpoint.retryable_ids().len(),
        errors: checkpoint.errors,
        started_at: checkpoint.started_at,
        last_updated_at: checkpoint.last_updated_at,
    };

    Ok(Json(ImportStatusResponse { stats, catalog }))
}

/// POST /api/wordpress-import/start
///
/// Spawns one batch run in the background and acknowledges with 202.
/// Returns 409 if a live run holds the checkpoint, 400 if no source export
/// is configured. Settings saved through the API override the startup
/// configuration.
pub async fn start_import(
    State(state): State<AppState>,
    request: Option<Json<StartImportRequest>>,
) -> ApiResult<(StatusCode, Json<StartImportResponse>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();

    let checkpoint = crate::db::checkpoint::load_checkpoint(&state.db).await?;
    if checkpoint.has_live_run() {
        return Err(ApiError::Conflict(
            "an import run is already active".to_string(),
        ));
    }

    let params = crate::db::settings::load_import_parameters(&state.db).await?;
    let export_path = params
        .source_export_path
        .clone()
        .or_else(|| state.config.source_export_path.clone())
        .ok_or_else(|| ApiError::BadRequest("source export path not configured".to_string()))?;
    if !std::path::Path::new(&export_path).exists() {
        return Err(ApiError::BadRequest(format!(
            "source export not found: {}",
            export_path
        )));
    }

    let saved_batch_size = (params.batch_size != crate::services::DEFAULT_BATCH_SIZE)
        .then_some(params.batch_size);
    let batch_size = request
        .batch_size
        .or(saved_batch_size)
        .unwrap_or(state.config.batch_size)
        .max(1);
    let photo_host = params
        .legacy_photo_host
        .clone()
        .unwrap_or_else(|| state.config.legacy_photo_host.clone());
    let response = StartImportResponse {
        state: RunState::Running,
        resume_from_id: checkpoint.last_processed_id,
        batch_size,
        retry_pending: checkpoint.retryable_ids().len(),
        started_at: Utc::now(),
    };

    tracing::info!(
        export_path = %export_path,
        batch_size = batch_size,
        resume_from_id = checkpoint.last_processed_id,
        "Import run requested"
    );

    // Parsing the dump and running the batch happen off the request path;
    // progress is observable via /events and the status endpoint.
    let state_clone = state.clone();
    tokio::spawn(async move {
        if let Err(e) =
            execute_import_run(state_clone.clone(), export_path, batch_size, photo_host).await
        {
            tracing::error!(error = %e, "Import run background task failed");
            *state_clone.last_error.write().await = Some(e.to_string());
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn execute_import_run(
    state: AppState,
    export_path: String,
    batch_size: u32,
    photo_host: String,
) -> propsync_common::Result<()> {
    let records = sql_source::parse_export_file(std::path::Path::new(&export_path))?;
    crate::db::settings::set_setting(&state.db, SOURCE_COUNT_KEY, &records.len().to_string())
        .await?;

    let driver = ImportDriver::new(state.db.clone(), state.event_bus.clone(), batch_size, photo_host);
    driver.run_batch(&records).await?;
    Ok(())
}

/// POST /api/wordpress-import/reset
///
/// Destructive: clears the checkpoint back to pristine. Refused while a run
/// is active.
pub async fn reset_import(State(state): State<AppState>) -> ApiResult<Json<ResetImportResponse>> {
    let checkpoint = crate::db::checkpoint::load_checkpoint(&state.db).await?;
    if checkpoint.has_live_run() {
        return Err(ApiError::Conflict(
            "cannot reset while an import run is active".to_string(),
        ));
    }

    let reset = crate::db::checkpoint::reset_checkpoint(&state.db).await?;
    state.event_bus.emit(PropsyncEvent::CheckpointReset {
        timestamp: Utc::now(),
    });
    tracing::info!("Import checkpoint reset by operator");

    Ok(Json(ResetImportResponse {
        state: reset.run_state,
        last_processed_id: reset.last_processed_id,
        reset_at: Utc::now(),
    }))
}

/// PUT /api/wordpress-import/settings request; absent fields keep their
/// saved value
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSettingsRequest {
    pub batch_size: Option<u32>,
    pub legacy_photo_host: Option<String>,
    pub source_export_path: Option<String>,
}

/// GET /api/wordpress-import/settings
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<ImportParameters>> {
    let params = crate::db::settings::load_import_parameters(&state.db).await?;
    Ok(Json(params))
}

/// PUT /api/wordpress-import/settings
///
/// Persists to the settings table (the highest-priority configuration
/// tier); subsequent start requests pick the values up. Mirrored into the
/// TOML config file when one exists.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<ImportParameters>> {
    let mut params = crate::db::settings::load_import_parameters(&state.db).await?;
    if let Some(batch_size) = request.batch_size {
        params.batch_size = batch_size.max(1);
    }
    if let Some(host) = request.legacy_photo_host {
        params.legacy_photo_host = Some(host);
    }
    if let Some(path) = request.source_export_path {
        params.source_export_path = Some(path);
    }
    crate::db::settings::save_import_parameters(&state.db, &params).await?;

    if let Ok(toml_path) = propsync_common::config::default_config_path() {
        if let Err(e) = crate::config::sync_settings_to_toml(&params, &toml_path) {
            tracing::warn!(error = %e, "Failed to sync settings to TOML config");
        }
    }

    Ok(Json(params))
}

/// Build import API routes
pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/wordpress-import/status", get(import_status))
        .route("/api/wordpress-import/start", post(start_import))
        .route("/api/wordpress-import/reset", post(reset_import))
        .route(
            "/api/wordpress-import/settings",
            get(get_settings).put(update_settings),
        )
}
