use rayon::prelude::*;
use serde::Serialize;

use super::dataset::Dataset;
use crate::error::AnalyticsError;

/// Square Pearson matrix over the numeric columns. Off-diagonal entries are `None`
/// when a pair has fewer than two shared observations or no variance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Distinct column pairs whose |r| exceeds `threshold`, strongest first.
    pub fn strong_pairs(&self, threshold: f64) -> Vec<(String, String, f64)> {
        let mut pairs = Vec::new();
        for i in 0..self.columns.len() {
            for j in (i + 1)..self.columns.len() {
                if let Some(r) = self.values[i][j] {
                    if r.abs() > threshold {
                        pairs.push((self.columns[i].clone(), self.columns[j].clone(), r));
                    }
                }
            }
        }
        pairs.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
        pairs
    }
}

pub fn correlate(dataset: &Dataset) -> Result<CorrelationMatrix, AnalyticsError> {
    let numeric = dataset.numeric_column_indices();
    if numeric.len() < 2 {
        return Err(AnalyticsError::InsufficientColumns {
            required: 2,
            found: numeric.len(),
        });
    }

    let series: Vec<Vec<Option<f64>>> = numeric.iter().map(|&c| dataset.numeric_column(c)).collect();
    let n = numeric.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();

    let coefficients: Vec<(usize, usize, Option<f64>)> = pairs
        .par_iter()
        .map(|&(i, j)| (i, j, pearson(&series[i], &series[j])))
        .collect();

    let mut values = vec![vec![None; n]; n];
    for (i, row) in values.iter_mut().enumerate() {
        row[i] = Some(1.0);
    }
    for (i, j, r) in coefficients {
        values[i][j] = r;
        values[j][i] = r;
    }

    Ok(CorrelationMatrix {
        columns: numeric.iter().map(|&c| dataset.columns()[c].name.clone()).collect(),
        values,
    })
}

/// Pearson correlation over the rows where both sides are present.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let paired: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if paired.len() < 2 {
        return None;
    }

    let n = paired.len() as f64;
    let mx = paired.iter().map(|p| p.0).sum::<f64>() / n;
    let my = paired.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &paired {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}
