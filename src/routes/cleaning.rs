use std::sync::Arc;

use axum::{
    extract::Query,
    routing::{get, post},
    Json, Router,
};

use super::CurrentSession;
use crate::error::AppError;
use crate::models::{CleaningConfigRequest, ThresholdQuery, DEFAULT_OUTLIER_THRESHOLD};
use crate::services::anomaly::{self, OutlierReport};
use crate::services::cleaning::{CleaningConfig, CleaningResult};
use crate::services::quality::QualityMetrics;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quality", get(assess_quality))
        .route("/clean", post(clean_data))
        .route("/outliers", get(detect_outliers))
}

async fn assess_quality(CurrentSession(session): CurrentSession) -> Result<Json<QualityMetrics>, AppError> {
    Ok(Json(session.quality()?))
}

async fn clean_data(
    CurrentSession(session): CurrentSession,
    Json(request): Json<CleaningConfigRequest>,
) -> Result<Json<CleaningResult>, AppError> {
    let config = CleaningConfig::try_from(request)?;
    let result = tokio::task::spawn_blocking(move || session.clean(&config))
        .await
        .map_err(|e| AppError::Internal(format!("Cleaning task failed: {}", e)))??;
    tracing::info!(
        "Cleaned dataset with {} strategy: {} rows remain",
        result.strategy_used.as_str(),
        result.final_rows
    );
    Ok(Json(result))
}

async fn detect_outliers(
    CurrentSession(session): CurrentSession,
    Query(query): Query<ThresholdQuery>,
) -> Result<Json<OutlierReport>, AppError> {
    let dataset = session.current()?;
    let threshold = query.threshold.unwrap_or(DEFAULT_OUTLIER_THRESHOLD);
    let result = anomaly::detect_anomalies(&dataset, threshold)?;
    Ok(Json(result.into()))
}
