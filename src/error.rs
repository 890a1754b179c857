use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;
use thiserror::Error;

/// Recoverable conditions raised by the dataset store and the analysis engines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    #[error("No data loaded")]
    NoDataLoaded,
    #[error("No cleaned data available. Run cleaning first.")]
    NoCleanedData,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("Column {0} not found or not usable for this operation")]
    UnknownColumn(String),
    #[error("Need at least {required} numeric columns, found {found}")]
    InsufficientColumns { required: usize, found: usize },
    #[error("No numeric columns found for segmentation")]
    InsufficientFeatures,
    #[error("Insufficient data for forecasting: {found} historical points, need at least 2")]
    InsufficientHistory { found: usize },
    #[error("Insufficient data points for {requested} clusters ({available} usable rows)")]
    InvalidClusterCount { requested: usize, available: usize },
}

impl AnalyticsError {
    pub fn code(&self) -> &'static str {
        match self {
            AnalyticsError::NoDataLoaded => "NO_DATA_LOADED",
            AnalyticsError::NoCleanedData => "NO_CLEANED_DATA",
            AnalyticsError::InvalidConfig(_) => "INVALID_CONFIG",
            AnalyticsError::InvalidDataset(_) => "INVALID_DATASET",
            AnalyticsError::UnknownColumn(_) => "UNKNOWN_COLUMN",
            AnalyticsError::InsufficientColumns { .. } => "INSUFFICIENT_COLUMNS",
            AnalyticsError::InsufficientFeatures => "INSUFFICIENT_FEATURES",
            AnalyticsError::InsufficientHistory { .. } => "INSUFFICIENT_HISTORY",
            AnalyticsError::InvalidClusterCount { .. } => "INVALID_CLUSTER_COUNT",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AnalyticsError::NoDataLoaded | AnalyticsError::NoCleanedData => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("HTTP error: {0}")]
    HttpError(String),
    #[error("File processing error: {0}")]
    FileProcessingError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseError(err.to_string())
    }
}

impl From<polars::error::PolarsError> for AppError {
    fn from(err: polars::error::PolarsError) -> Self {
        AppError::FileProcessingError(err.to_string())
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Analytics(err) => (err.status(), err.code()),
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            AppError::IoError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            AppError::ParseError(_) => (StatusCode::BAD_REQUEST, "PARSE_ERROR"),
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::HttpError(_) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR"),
            AppError::FileProcessingError(_) => (StatusCode::BAD_REQUEST, "FILE_PROCESSING_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "code": code,
        }));

        (status, body).into_response()
    }
}
