use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};

use super::CurrentSession;
use crate::error::AppError;
use crate::models::{
    DataResponse, DatabaseConnectionRequest, GenerateQuery, ImportRequest, PreviewQuery,
    PreviewResponse, RowsRequest, UploadQuery, DEFAULT_SAMPLE_SIZE,
};
use crate::services::db_loader::{DbLoader, DbType};
use crate::services::file_processor::{self, FileKind};
use crate::services::sample_data::{self, SampleKind};
use crate::services::{Dataset, DatasetInfo};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rows", post(ingest_rows))
        .route("/upload", post(upload_file))
        .route("/import", post(import_file))
        .route("/connect", post(connect_database))
        .route("/generate/:data_type", get(generate_sample))
        .route("/preview", get(preview))
        .route("/raw", get(raw_data))
        .route("/cleaned", get(cleaned_data))
}

async fn ingest_rows(
    CurrentSession(session): CurrentSession,
    Json(request): Json<RowsRequest>,
) -> Result<Json<DatasetInfo>, AppError> {
    if request.rows.is_empty() {
        return Err(AppError::InvalidInput("No rows provided".to_string()));
    }
    let dataset = Dataset::from_json_rows(&request.rows);
    Ok(Json(session.ingest(dataset, "request body")))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<UploadQuery>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<DatasetInfo>, AppError> {
    let kind = FileKind::from_filename(&query.filename)?;
    let file_data = body.map_err(|e| AppError::InvalidInput(format!("Failed to read upload: {}", e)))?;
    if file_data.len() > state.config.max_file_size {
        return Err(AppError::InvalidInput(format!(
            "File exceeds the maximum size of {} bytes",
            state.config.max_file_size
        )));
    }

    tracing::info!("Received upload {} ({} bytes)", query.filename, file_data.len());
    let dataset = file_processor::parse_file(kind, file_data)?;
    Ok(Json(session.ingest(dataset, &query.filename)))
}

async fn import_file(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Json(request): Json<ImportRequest>,
) -> Result<Json<DatasetInfo>, AppError> {
    let kind = match &request.file_type {
        Some(tag) => FileKind::from_tag(tag)?,
        None => FileKind::from_filename(request.url.split('?').next().unwrap_or_default())?,
    };

    let file_data = file_processor::load_file_from_url(&request.url).await?;
    if file_data.len() > state.config.max_file_size {
        return Err(AppError::InvalidInput(format!(
            "File exceeds the maximum size of {} bytes",
            state.config.max_file_size
        )));
    }
    let dataset = file_processor::parse_file(kind, file_data)?;
    Ok(Json(session.ingest(dataset, &request.url)))
}

async fn connect_database(
    CurrentSession(session): CurrentSession,
    Json(request): Json<DatabaseConnectionRequest>,
) -> Result<Json<DatasetInfo>, AppError> {
    let db_type: DbType = request.db_type.parse()?;
    tracing::info!("Connecting to {:?} database for table {}", db_type, request.table_name);

    let table_name = request.table_name.clone();
    let dataset = tokio::task::spawn_blocking(move || {
        DbLoader::open(&request.connection_string)?.load_table(&request.table_name)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Database task failed: {}", e)))??;

    Ok(Json(session.ingest(dataset, &format!("table {}", table_name))))
}

async fn generate_sample(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Path(data_type): Path<String>,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<DatasetInfo>, AppError> {
    let kind: SampleKind = data_type.parse()?;
    let size = query.size.unwrap_or(DEFAULT_SAMPLE_SIZE);
    let dataset = sample_data::generate(kind, size, state.config.sample_seed)?;
    Ok(Json(session.ingest(dataset, &format!("{} sample", data_type))))
}

async fn preview(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<PreviewResponse>, AppError> {
    let snapshot = session.snapshot()?;
    let limit = query.limit.unwrap_or(state.config.preview_limit);
    Ok(Json(PreviewResponse {
        data: snapshot.current.to_json_rows(Some(limit)),
        total_rows: snapshot.current.row_count(),
        has_cleaned: snapshot.has_cleaned,
    }))
}

async fn raw_data(CurrentSession(session): CurrentSession) -> Result<Json<DataResponse>, AppError> {
    let dataset = session.raw()?;
    Ok(Json(DataResponse {
        data: dataset.to_json_rows(None),
        count: dataset.row_count(),
    }))
}

async fn cleaned_data(CurrentSession(session): CurrentSession) -> Result<Json<DataResponse>, AppError> {
    let dataset = session.cleaned()?;
    Ok(Json(DataResponse {
        data: dataset.to_json_rows(None),
        count: dataset.row_count(),
    }))
}
