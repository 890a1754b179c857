use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::CurrentSession;
use crate::error::{AnalyticsError, AppError};
use crate::models::{ColumnQuery, DistributionQuery, HypothesisQuery, TrendQuery};
use crate::services::correlation;
use crate::services::distribution::{self, DistributionResult};
use crate::services::insights::{self, Insight, InsightContext};
use crate::services::statistics::{self, CategoricalDistribution, HypothesisTest, Percentiles, StatSummary};
use crate::services::trend::{self, TrendResult};
use crate::services::{Session, SessionSnapshot};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/summary", get(summary))
        .route("/distribution", get(distribution))
        .route("/correlation", get(correlation_matrix))
        .route("/trend", get(trend_series))
        .route("/categorical", get(categorical))
        .route("/percentiles", get(percentiles))
        .route("/hypothesis", get(hypothesis_test))
        .route("/insights", get(generate_insights))
}

async fn summary(CurrentSession(session): CurrentSession) -> Result<Json<Vec<StatSummary>>, AppError> {
    let dataset = session.current()?;
    Ok(Json(statistics::summarize(&dataset)))
}

async fn distribution(
    State(state): State<Arc<AppState>>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<DistributionQuery>,
) -> Result<Json<DistributionResult>, AppError> {
    let dataset = session.current()?;
    let bins = query.bins.unwrap_or(state.config.default_bins);
    Ok(Json(distribution::distribute(&dataset, &query.column, bins)?))
}

/// Too few numeric columns is reported in the body rather than as a failed request.
async fn correlation_matrix(CurrentSession(session): CurrentSession) -> Result<Json<Value>, AppError> {
    let dataset = session.current()?;
    match correlation::correlate(&dataset) {
        Ok(matrix) => Ok(Json(serde_json::to_value(matrix)?)),
        Err(err @ AnalyticsError::InsufficientColumns { .. }) => Ok(Json(json!({
            "error": err.to_string(),
            "code": err.code(),
        }))),
        Err(err) => Err(err.into()),
    }
}

async fn trend_series(
    CurrentSession(session): CurrentSession,
    Query(query): Query<TrendQuery>,
) -> Result<Json<TrendResult>, AppError> {
    let dataset = session.current()?;
    Ok(Json(trend::trend(&dataset, &query.date_col, &query.value_col)?))
}

async fn categorical(
    CurrentSession(session): CurrentSession,
    Query(query): Query<ColumnQuery>,
) -> Result<Json<CategoricalDistribution>, AppError> {
    let dataset = session.current()?;
    Ok(Json(statistics::categorical(&dataset, &query.column)?))
}

async fn percentiles(
    CurrentSession(session): CurrentSession,
    Query(query): Query<ColumnQuery>,
) -> Result<Json<Percentiles>, AppError> {
    let dataset = session.current()?;
    Ok(Json(statistics::percentiles(&dataset, &query.column)?))
}

async fn hypothesis_test(
    CurrentSession(session): CurrentSession,
    Query(query): Query<HypothesisQuery>,
) -> Result<Json<HypothesisTest>, AppError> {
    let dataset = session.current()?;
    Ok(Json(statistics::hypothesis_test(&dataset, &query.col1, &query.col2)?))
}

async fn generate_insights(CurrentSession(session): CurrentSession) -> Result<Json<Vec<Insight>>, AppError> {
    Ok(Json(with_insight_context(&session, insights::insights)?))
}

/// Gathers quality, summary, correlation and forecast growth for one snapshot of the
/// current dataset and hands them to `generate`.
pub(crate) fn with_insight_context<T>(
    session: &Session,
    generate: impl FnOnce(&InsightContext) -> T,
) -> Result<T, AppError> {
    let SessionSnapshot { current: dataset, quality, .. } = session.snapshot()?;
    let summary = statistics::summarize(&dataset);
    let correlation = correlation::correlate(&dataset).ok();
    let growth_rate = trend::forecast(
        &dataset,
        &trend::ForecastOptions {
            periods: 6,
            ..Default::default()
        },
        &trend::ColumnSelectionPolicy::default(),
    )
    .ok()
    .map(|f| f.metrics.growth_rate);

    let ctx = InsightContext {
        dataset: &dataset,
        quality: &quality,
        summary: &summary,
        correlation: correlation.as_ref(),
        growth_rate,
    };
    Ok(generate(&ctx))
}
