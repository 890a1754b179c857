//! Time-ordered aggregation and linear-trend forecasting.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::Serialize;

use super::dataset::{is_month_only, parse_date, Cell, ColumnKind, Dataset};
use super::numeric;
use super::statistics::numeric_column;
use crate::error::AnalyticsError;

/// Number of contiguous chunks used when the data has no date column.
const FALLBACK_CHUNKS: usize = 8;
/// Dates spanning at most this many days are grouped per day, otherwise per month.
const DAILY_SPAN_DAYS: i64 = 31;

pub const DEFAULT_VALUE_KEYWORDS: [&str; 3] = ["revenue", "sales", "price"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Month,
}

impl Granularity {
    fn truncate(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Month => date.with_day0(0).unwrap_or(date),
        }
    }

    fn label(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Day => date.format("%Y-%m-%d").to_string(),
            Granularity::Month => date.format("%Y-%m").to_string(),
        }
    }

    fn step(&self, date: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Granularity::Day => date.checked_add_signed(Duration::days(steps as i64)),
            Granularity::Month => date.checked_add_months(Months::new(steps)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastMetrics {
    pub avg_historical: f64,
    pub avg_forecast: f64,
    pub growth_rate: f64,
    pub periods: usize,
    pub total_historical: f64,
    pub total_forecast: f64,
}

impl ForecastMetrics {
    pub fn from_series(historical: &[f64], forecast: &[f64]) -> Self {
        let avg_historical = numeric::mean(historical).unwrap_or(0.0);
        let avg_forecast = numeric::mean(forecast).unwrap_or(0.0);
        Self {
            avg_historical,
            avg_forecast,
            growth_rate: growth_rate(avg_historical, avg_forecast),
            periods: forecast.len(),
            total_historical: historical.iter().sum(),
            total_forecast: forecast.iter().sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub labels: Vec<String>,
    pub historical: Vec<f64>,
    pub forecast: Vec<f64>,
    pub metrics: ForecastMetrics,
    pub date_column: Option<String>,
    pub value_column: String,
}

#[derive(Debug, Clone, Default)]
pub struct ForecastOptions {
    pub periods: usize,
    pub date_column: Option<String>,
    pub value_column: Option<String>,
}

/// Percentage change from the historical average to the forecast average; zero
/// when there is no historical level to compare against.
pub fn growth_rate(avg_historical: f64, avg_forecast: f64) -> f64 {
    if avg_historical == 0.0 {
        0.0
    } else {
        (avg_forecast - avg_historical) / avg_historical * 100.0
    }
}

/// How forecasting picks its date and value columns when the caller does not name them.
#[derive(Debug, Clone)]
pub struct ColumnSelectionPolicy {
    pub value_keywords: Vec<String>,
}

impl Default for ColumnSelectionPolicy {
    fn default() -> Self {
        Self {
            value_keywords: DEFAULT_VALUE_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl ColumnSelectionPolicy {
    pub fn date_column(&self, dataset: &Dataset) -> Option<usize> {
        dataset.columns_of_kind(ColumnKind::Datetime).first().copied()
    }

    /// First keyword with a matching numeric column wins; otherwise the first numeric column.
    pub fn value_column(&self, dataset: &Dataset) -> Option<usize> {
        let numeric = dataset.numeric_column_indices();
        self.value_keywords
            .iter()
            .find_map(|keyword| {
                numeric
                    .iter()
                    .copied()
                    .find(|&idx| dataset.columns()[idx].name.to_lowercase().contains(keyword.as_str()))
            })
            .or_else(|| numeric.first().copied())
    }
}

struct DatedSeries {
    granularity: Granularity,
    periods: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl DatedSeries {
    fn labels(&self) -> Vec<String> {
        self.periods.iter().map(|d| self.granularity.label(*d)).collect()
    }
}

fn date_of(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Text(s) => parse_date(s).map(|dt| dt.date()),
        _ => None,
    }
}

fn aggregate_by_date(dataset: &Dataset, date_idx: usize, value_idx: usize) -> Result<DatedSeries, AnalyticsError> {
    let observations: Vec<(NaiveDate, f64)> = dataset
        .rows()
        .iter()
        .filter_map(|row| Some((date_of(&row[date_idx])?, row[value_idx].as_f64()?)))
        .collect();

    let parsed_any = dataset.cells(date_idx).any(|c| date_of(c).is_some());
    if !parsed_any {
        return Err(AnalyticsError::UnknownColumn(dataset.columns()[date_idx].name.clone()));
    }

    let month_only = dataset
        .cells(date_idx)
        .filter(|c| !c.is_missing())
        .all(|c| matches!(c, Cell::Text(s) if is_month_only(s)));
    let span = match (
        observations.iter().map(|o| o.0).min(),
        observations.iter().map(|o| o.0).max(),
    ) {
        (Some(first), Some(last)) => (last - first).num_days(),
        _ => 0,
    };
    let granularity = if !month_only && span <= DAILY_SPAN_DAYS {
        Granularity::Day
    } else {
        Granularity::Month
    };

    let mut grouped: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in observations {
        *grouped.entry(granularity.truncate(date)).or_insert(0.0) += value;
    }

    let (periods, values) = grouped.into_iter().unzip();
    Ok(DatedSeries {
        granularity,
        periods,
        values,
    })
}

/// Sums `value_col` per day or month of `date_col`, in chronological order.
pub fn trend(dataset: &Dataset, date_col: &str, value_col: &str) -> Result<TrendResult, AnalyticsError> {
    let date_idx = dataset
        .column_index(date_col)
        .ok_or_else(|| AnalyticsError::UnknownColumn(date_col.to_string()))?;
    let value_idx = numeric_column(dataset, value_col)?;

    let series = aggregate_by_date(dataset, date_idx, value_idx)?;
    Ok(TrendResult {
        labels: series.labels(),
        values: series.values,
    })
}

fn chunk_values(values: &[f64], n_chunks: usize) -> Vec<f64> {
    let chunk_size = (values.len() / n_chunks).max(1);
    (0..n_chunks)
        .filter_map(|i| {
            let start = i * chunk_size;
            if start >= values.len() {
                return None;
            }
            let end = if i + 1 < n_chunks {
                (start + chunk_size).min(values.len())
            } else {
                values.len()
            };
            Some(values[start..end].iter().sum())
        })
        .collect()
}

pub fn forecast(
    dataset: &Dataset,
    options: &ForecastOptions,
    policy: &ColumnSelectionPolicy,
) -> Result<ForecastResult, AnalyticsError> {
    let value_idx = match &options.value_column {
        Some(name) => numeric_column(dataset, name)?,
        None => policy.value_column(dataset).ok_or(AnalyticsError::InsufficientColumns {
            required: 1,
            found: 0,
        })?,
    };
    let date_idx = match &options.date_column {
        Some(name) => Some(
            dataset
                .column_index(name)
                .ok_or_else(|| AnalyticsError::UnknownColumn(name.clone()))?,
        ),
        None => policy.date_column(dataset),
    };

    let (labels, historical, future_labels): (Vec<String>, Vec<f64>, Vec<String>) = match date_idx {
        Some(idx) => {
            let series = aggregate_by_date(dataset, idx, value_idx)?;
            let last = series.periods.last().copied();
            let future = (1..=options.periods as u32)
                .map(|step| {
                    last.and_then(|d| series.granularity.step(d, step))
                        .map(|d| series.granularity.label(d))
                        .unwrap_or_else(|| format!("Forecast +{}", step))
                })
                .collect();
            (series.labels(), series.values.clone(), future)
        }
        None => {
            let chunks = chunk_values(&dataset.numeric_values(value_idx), FALLBACK_CHUNKS);
            let labels = (1..=chunks.len()).map(|i| format!("Period {}", i)).collect();
            let future = (1..=options.periods)
                .map(|i| format!("Period {}", chunks.len() + i))
                .collect();
            (labels, chunks, future)
        }
    };

    let (slope, intercept) = numeric::linear_trend(&historical)
        .ok_or(AnalyticsError::InsufficientHistory { found: historical.len() })?;
    let forecast: Vec<f64> = (0..options.periods)
        .map(|i| intercept + slope * (historical.len() + i) as f64)
        .collect();

    let metrics = ForecastMetrics::from_series(&historical, &forecast);
    tracing::info!(
        "Forecast over {} historical points, {} periods, growth {:.2}%",
        historical.len(),
        options.periods,
        metrics.growth_rate
    );

    Ok(ForecastResult {
        labels: labels.into_iter().chain(future_labels).collect(),
        historical,
        forecast,
        metrics,
        date_column: date_idx.map(|idx| dataset.columns()[idx].name.clone()),
        value_column: dataset.columns()[value_idx].name.clone(),
    })
}
