use serde::Serialize;

use super::dataset::Dataset;
use super::statistics::numeric_column;
use crate::error::AnalyticsError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionResult {
    pub column: String,
    pub labels: Vec<String>,
    pub values: Vec<usize>,
}

/// Equal-width histogram over `[min, max]`; the last bin includes `max`.
pub fn distribute(dataset: &Dataset, column: &str, bins: usize) -> Result<DistributionResult, AnalyticsError> {
    if bins == 0 {
        return Err(AnalyticsError::InvalidConfig("bins must be at least 1".to_string()));
    }
    let idx = numeric_column(dataset, column)?;
    let values = dataset.numeric_values(idx);

    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if values.is_empty() {
        lo = 0.0;
        hi = 1.0;
    } else if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in &values {
        let bin = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[bin] += 1;
    }

    let labels = (0..bins)
        .map(|i| {
            let start = lo + width * i as f64;
            let end = if i + 1 == bins { hi } else { lo + width * (i + 1) as f64 };
            format!("{:.1}–{:.1}", start, end)
        })
        .collect();

    Ok(DistributionResult {
        column: column.to_string(),
        labels,
        values: counts,
    })
}
