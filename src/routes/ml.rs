use std::sync::Arc;

use axum::{
    extract::Query,
    routing::{get, post},
    Json, Router,
};

use super::analytics::with_insight_context;
use super::CurrentSession;
use crate::error::AppError;
use crate::models::{ForecastRequest, SegmentationRequest, ThresholdQuery, DEFAULT_ANOMALY_THRESHOLD};
use crate::services::anomaly::{self, AnomalyResult};
use crate::services::insights::{self, Recommendation};
use crate::services::segmentation::{self, SegmentationResult};
use crate::services::trend::{self, ColumnSelectionPolicy, ForecastOptions, ForecastResult};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/forecast", post(forecast_sales))
        .route("/segment", post(segment_customers))
        .route("/anomalies", get(detect_anomalies))
        .route("/recommendations", get(generate_recommendations))
}

async fn forecast_sales(
    CurrentSession(session): CurrentSession,
    Json(request): Json<ForecastRequest>,
) -> Result<Json<ForecastResult>, AppError> {
    let options = ForecastOptions::try_from(request)?;
    let dataset = session.current()?;
    Ok(Json(trend::forecast(&dataset, &options, &ColumnSelectionPolicy::default())?))
}

async fn segment_customers(
    CurrentSession(session): CurrentSession,
    Json(request): Json<SegmentationRequest>,
) -> Result<Json<SegmentationResult>, AppError> {
    let dataset = session.current()?;
    Ok(Json(segmentation::segment(&dataset, request.clamped_clusters())?))
}

async fn detect_anomalies(
    CurrentSession(session): CurrentSession,
    Query(query): Query<ThresholdQuery>,
) -> Result<Json<AnomalyResult>, AppError> {
    let dataset = session.current()?;
    let threshold = query.threshold.unwrap_or(DEFAULT_ANOMALY_THRESHOLD);
    Ok(Json(anomaly::detect_anomalies(&dataset, threshold)?))
}

async fn generate_recommendations(
    CurrentSession(session): CurrentSession,
) -> Result<Json<Vec<Recommendation>>, AppError> {
    Ok(Json(with_insight_context(&session, insights::recommendations)?))
}
