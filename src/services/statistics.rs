use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::Serialize;

use super::dataset::{CellKey, ColumnKind, Dataset};
use super::numeric;
use crate::error::AnalyticsError;

const PERCENTILES: [u8; 7] = [10, 25, 50, 75, 90, 95, 99];
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatSummary {
    pub field: String,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalDistribution {
    pub column: String,
    pub labels: Vec<String>,
    pub values: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Percentiles {
    pub column: String,
    pub percentiles: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HypothesisTest {
    pub t_statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
    pub significant: bool,
    pub interpretation: String,
}

/// Descriptive statistics for every numeric column with at least one value, in
/// column order. `std` is the sample standard deviation.
pub fn summarize(dataset: &Dataset) -> Vec<StatSummary> {
    dataset
        .numeric_column_indices()
        .par_iter()
        .filter_map(|&idx| {
            let values = dataset.numeric_values(idx);
            Some(StatSummary {
                field: dataset.columns()[idx].name.clone(),
                mean: numeric::mean(&values)?,
                median: numeric::median(&values)?,
                std: numeric::sample_std(&values)?,
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                count: values.len(),
            })
        })
        .collect()
}

/// Frequency table of a column's observed values, most frequent first.
pub fn categorical(dataset: &Dataset, column: &str) -> Result<CategoricalDistribution, AnalyticsError> {
    let idx = dataset
        .column_index(column)
        .ok_or_else(|| AnalyticsError::UnknownColumn(column.to_string()))?;

    let mut counts: HashMap<CellKey, usize> = HashMap::new();
    let mut order: Vec<(CellKey, String)> = Vec::new();
    for cell in dataset.cells(idx).filter(|c| !c.is_missing()) {
        let key = cell.key();
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push((key, cell.to_string()));
        }
        *count += 1;
    }

    let mut table: Vec<(String, usize)> = order
        .into_iter()
        .map(|(key, label)| (label, counts[&key]))
        .collect();
    table.sort_by(|a, b| b.1.cmp(&a.1));

    let (labels, values) = table.into_iter().unzip();
    Ok(CategoricalDistribution {
        column: column.to_string(),
        labels,
        values,
    })
}

pub fn percentiles(dataset: &Dataset, column: &str) -> Result<Percentiles, AnalyticsError> {
    let idx = numeric_column(dataset, column)?;
    let mut values = dataset.numeric_values(idx);
    values.sort_by(f64::total_cmp);

    let percentiles = PERCENTILES
        .iter()
        .filter_map(|&p| numeric::percentile(&values, p as f64).map(|v| (format!("p{}", p), v)))
        .collect();

    Ok(Percentiles {
        column: column.to_string(),
        percentiles,
    })
}

/// Independent two-sample Student's t-test (pooled variance) between two numeric
/// columns, each using its own non-missing values.
pub fn hypothesis_test(dataset: &Dataset, col1: &str, col2: &str) -> Result<HypothesisTest, AnalyticsError> {
    let first = dataset.numeric_values(numeric_column(dataset, col1)?);
    let second = dataset.numeric_values(numeric_column(dataset, col2)?);
    let (n1, n2) = (first.len(), second.len());
    if n1 < 2 || n2 < 2 {
        return Err(AnalyticsError::InvalidDataset(format!(
            "t-test needs at least 2 values per column ({} has {}, {} has {})",
            col1, n1, col2, n2
        )));
    }

    let (mean1, mean2) = (
        numeric::mean(&first).unwrap_or_default(),
        numeric::mean(&second).unwrap_or_default(),
    );
    let var1 = numeric::sample_std(&first).unwrap_or_default().powi(2);
    let var2 = numeric::sample_std(&second).unwrap_or_default().powi(2);
    let df = (n1 + n2 - 2) as f64;
    let pooled = ((n1 - 1) as f64 * var1 + (n2 - 1) as f64 * var2) / df;
    let se = (pooled * (1.0 / n1 as f64 + 1.0 / n2 as f64)).sqrt();

    let t_statistic = if se > 0.0 {
        (mean1 - mean2) / se
    } else if mean1 == mean2 {
        0.0
    } else {
        return Err(AnalyticsError::InvalidDataset(format!(
            "{} and {} are constant with different values; the t statistic is undefined",
            col1, col2
        )));
    };
    let p_value = numeric::t_two_tailed_p(t_statistic, df);
    let significant = p_value < SIGNIFICANCE_LEVEL;

    Ok(HypothesisTest {
        t_statistic,
        p_value,
        degrees_of_freedom: df,
        significant,
        interpretation: if significant {
            "Significant difference".to_string()
        } else {
            "No significant difference".to_string()
        },
    })
}

/// Index of `column` when it exists and is numeric.
pub fn numeric_column(dataset: &Dataset, column: &str) -> Result<usize, AnalyticsError> {
    dataset
        .column_index(column)
        .filter(|&idx| dataset.columns()[idx].kind == ColumnKind::Numeric)
        .ok_or_else(|| AnalyticsError::UnknownColumn(column.to_string()))
}
