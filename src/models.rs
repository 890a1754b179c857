//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AnalyticsError;
use crate::services::cleaning::{CleaningConfig, CleaningStrategy};
use crate::services::trend::ForecastOptions;

pub const MAX_FORECAST_PERIODS: usize = 12;
pub const MIN_CLUSTERS: usize = 2;
pub const MAX_CLUSTERS: usize = 10;
pub const DEFAULT_SAMPLE_SIZE: usize = 500;
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 3.0;
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 2.5;

fn default_true() -> bool {
    true
}

fn default_strategy() -> String {
    "mean".to_string()
}

fn default_periods() -> usize {
    6
}

fn default_clusters() -> usize {
    4
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RowsRequest {
    pub rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub url: String,
    /// Falls back to the URL's extension when absent.
    pub file_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConnectionRequest {
    pub db_type: String,
    pub connection_string: String,
    pub table_name: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub data: Vec<Value>,
    pub total_rows: usize,
    pub has_cleaned: bool,
}

#[derive(Debug, Serialize)]
pub struct DataResponse {
    pub data: Vec<Value>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CleaningConfigRequest {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_true")]
    pub remove_duplicates: bool,
    #[serde(default = "default_true")]
    pub standardize_data: bool,
}

impl TryFrom<CleaningConfigRequest> for CleaningConfig {
    type Error = AnalyticsError;

    fn try_from(request: CleaningConfigRequest) -> Result<Self, Self::Error> {
        Ok(CleaningConfig {
            strategy: request.strategy.parse::<CleaningStrategy>()?,
            remove_duplicates: request.remove_duplicates,
            standardize_data: request.standardize_data,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ThresholdQuery {
    pub threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct DistributionQuery {
    pub column: String,
    pub bins: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnQuery {
    pub column: String,
}

#[derive(Debug, Deserialize)]
pub struct HypothesisQuery {
    pub col1: String,
    pub col2: String,
}

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub date_col: String,
    pub value_col: String,
}

#[derive(Debug, Deserialize)]
pub struct ForecastRequest {
    #[serde(default = "default_periods")]
    pub periods: usize,
    pub date_col: Option<String>,
    pub value_col: Option<String>,
}

impl TryFrom<ForecastRequest> for ForecastOptions {
    type Error = AnalyticsError;

    fn try_from(request: ForecastRequest) -> Result<Self, Self::Error> {
        if !(1..=MAX_FORECAST_PERIODS).contains(&request.periods) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "periods must be between 1 and {}, got {}",
                MAX_FORECAST_PERIODS, request.periods
            )));
        }
        Ok(ForecastOptions {
            periods: request.periods,
            date_column: request.date_col,
            value_column: request.value_col,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SegmentationRequest {
    #[serde(default = "default_clusters")]
    pub n_clusters: usize,
}

impl SegmentationRequest {
    pub fn clamped_clusters(&self) -> usize {
        self.n_clusters.clamp(MIN_CLUSTERS, MAX_CLUSTERS)
    }
}
