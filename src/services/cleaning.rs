//! Missing-value repair, de-duplication and standardisation.
//!
//! Cleaning never mutates the raw dataset: it works on a copy and returns the new
//! dataset together with a [`CleaningResult`] describing what changed.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::Serialize;

use super::dataset::{Cell, CellKey, ColumnKind, Dataset};
use super::numeric;
use crate::error::AnalyticsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CleaningStrategy {
    #[serde(rename = "mean")]
    Mean,
    #[serde(rename = "median")]
    Median,
    #[serde(rename = "mode")]
    Mode,
    #[serde(rename = "interpolation")]
    Interpolation,
    #[serde(rename = "ml")]
    MlPredict,
    #[serde(rename = "remove")]
    Remove,
}

impl CleaningStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleaningStrategy::Mean => "mean",
            CleaningStrategy::Median => "median",
            CleaningStrategy::Mode => "mode",
            CleaningStrategy::Interpolation => "interpolation",
            CleaningStrategy::MlPredict => "ml",
            CleaningStrategy::Remove => "remove",
        }
    }
}

impl FromStr for CleaningStrategy {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" => Ok(CleaningStrategy::Mean),
            "median" => Ok(CleaningStrategy::Median),
            "mode" => Ok(CleaningStrategy::Mode),
            "interpolation" => Ok(CleaningStrategy::Interpolation),
            "ml" => Ok(CleaningStrategy::MlPredict),
            "remove" => Ok(CleaningStrategy::Remove),
            other => Err(AnalyticsError::InvalidConfig(format!(
                "unknown cleaning strategy '{}', expected one of mean, median, mode, interpolation, ml, remove",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleaningConfig {
    pub strategy: CleaningStrategy,
    pub remove_duplicates: bool,
    pub standardize_data: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            strategy: CleaningStrategy::Mean,
            remove_duplicates: true,
            standardize_data: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningResult {
    pub missing_found: usize,
    pub missing_filled: usize,
    pub duplicates_removed: usize,
    pub final_rows: usize,
    pub final_columns: usize,
    pub strategy_used: CleaningStrategy,
}

pub fn clean(raw: &Dataset, config: &CleaningConfig) -> (Dataset, CleaningResult) {
    let mut working = raw.clone();

    if config.standardize_data {
        standardize(&mut working);
    }

    let duplicates_removed = if config.remove_duplicates {
        drop_duplicates(&mut working)
    } else {
        0
    };

    let missing_found = working.missing_count();
    let missing_filled = match config.strategy {
        CleaningStrategy::Mean => fill_with(&mut working, numeric::mean),
        CleaningStrategy::Median => fill_with(&mut working, numeric::median),
        CleaningStrategy::Mode => fill_mode(&mut working),
        CleaningStrategy::Interpolation => interpolate(&mut working),
        CleaningStrategy::MlPredict => predict_missing(&mut working),
        CleaningStrategy::Remove => {
            drop_incomplete_rows(&mut working);
            0
        }
    };
    working.refresh_kinds();

    let result = CleaningResult {
        missing_found,
        missing_filled,
        duplicates_removed,
        final_rows: working.row_count(),
        final_columns: working.column_count(),
        strategy_used: config.strategy,
    };

    tracing::info!(
        "Cleaning with strategy {} finished: {} missing found, {} filled, {} duplicates removed, {} rows remain",
        config.strategy.as_str(),
        result.missing_found,
        result.missing_filled,
        result.duplicates_removed,
        result.final_rows
    );

    (working, result)
}

/// Trims text cells, then turns numeric-looking text in numeric columns into numbers.
fn standardize(dataset: &mut Dataset) {
    for row in dataset.rows_mut().iter_mut() {
        for cell in row.iter_mut() {
            if let Cell::Text(s) = cell {
                let trimmed = s.trim();
                if trimmed.len() != s.len() {
                    *cell = Cell::Text(trimmed.to_string());
                }
            }
        }
    }
    dataset.refresh_kinds();

    let numeric = dataset.numeric_column_indices();
    for row in dataset.rows_mut().iter_mut() {
        for &idx in &numeric {
            if let Cell::Text(s) = &row[idx] {
                if let Some(number) = parse_number(s) {
                    row[idx] = number;
                }
            }
        }
    }
}

fn parse_number(s: &str) -> Option<Cell> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Cell::Int(i));
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Cell::Float)
}

fn drop_duplicates(dataset: &mut Dataset) -> usize {
    let before = dataset.row_count();
    let mut seen: HashSet<Vec<CellKey>> = HashSet::with_capacity(before);
    dataset
        .rows_mut()
        .retain(|row| seen.insert(row.iter().map(|c| c.key()).collect()));
    before - dataset.row_count()
}

fn drop_incomplete_rows(dataset: &mut Dataset) {
    dataset
        .rows_mut()
        .retain(|row| row.iter().all(|cell| !cell.is_missing()));
}

fn fill_column(dataset: &mut Dataset, column: usize, value: f64) -> usize {
    let mut filled = 0;
    for row in dataset.rows_mut().iter_mut() {
        if row[column].is_missing() {
            row[column] = Cell::Float(value);
            filled += 1;
        }
    }
    filled
}

/// Fills numeric columns with a statistic of their observed values.
fn fill_with(dataset: &mut Dataset, statistic: fn(&[f64]) -> Option<f64>) -> usize {
    let mut filled = 0;
    for column in dataset.numeric_column_indices() {
        if let Some(value) = statistic(&dataset.numeric_values(column)) {
            filled += fill_column(dataset, column, value);
        }
    }
    filled
}

/// Most frequent observed value per column; ties go to the value seen first.
fn fill_mode(dataset: &mut Dataset) -> usize {
    let mut filled = 0;
    for column in 0..dataset.column_count() {
        let mut counts: HashMap<CellKey, (usize, usize)> = HashMap::new();
        let mut first_cells: Vec<Cell> = Vec::new();
        for cell in dataset.cells(column).filter(|c| !c.is_missing()) {
            let next_slot = first_cells.len();
            let entry = counts.entry(cell.key()).or_insert_with(|| (0, next_slot));
            if entry.1 == next_slot {
                first_cells.push(cell.clone());
            }
            entry.0 += 1;
        }

        let winner = counts
            .values()
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
            .map(|&(_, slot)| first_cells[slot].clone());

        if let Some(value) = winner {
            for row in dataset.rows_mut().iter_mut() {
                if row[column].is_missing() {
                    row[column] = value.clone();
                    filled += 1;
                }
            }
        }
    }
    filled
}

/// Linear interpolation by row position; leading and trailing gaps copy the nearest value.
fn interpolate(dataset: &mut Dataset) -> usize {
    let mut filled = 0;
    for column in dataset.numeric_column_indices() {
        let values = dataset.numeric_column(column);
        let known: Vec<usize> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|_| i))
            .collect();
        if known.is_empty() {
            continue;
        }

        let mut next_known = 0;
        for (i, row) in dataset.rows_mut().iter_mut().enumerate() {
            if values[i].is_some() {
                continue;
            }
            if !row[column].is_missing() {
                continue;
            }
            while next_known < known.len() && known[next_known] < i {
                next_known += 1;
            }
            let before = next_known.checked_sub(1).map(|k| known[k]);
            let after = known.get(next_known).copied();
            let estimate = match (before, after) {
                (Some(p), Some(n)) => {
                    let (vp, vn) = (values[p].unwrap_or_default(), values[n].unwrap_or_default());
                    vp + (vn - vp) * (i - p) as f64 / (n - p) as f64
                }
                (Some(p), None) => values[p].unwrap_or_default(),
                (None, Some(n)) => values[n].unwrap_or_default(),
                (None, None) => continue,
            };
            row[column] = Cell::Float(estimate);
            filled += 1;
        }
    }
    filled
}

/// Regression imputation: each numeric column is predicted from the other numeric
/// columns of the same row, falling back to the column mean.
fn predict_missing(dataset: &mut Dataset) -> usize {
    let numeric = dataset.numeric_column_indices();
    let snapshot: Vec<Vec<Option<f64>>> =
        numeric.iter().map(|&c| dataset.numeric_column(c)).collect();
    let rows = dataset.row_count();
    let mut filled = 0;

    for (t, &target) in numeric.iter().enumerate() {
        let observed: Vec<f64> = snapshot[t].iter().flatten().copied().collect();
        let Some(fallback) = numeric::mean(&observed) else {
            continue;
        };
        if observed.len() == rows {
            continue;
        }

        let predictors: Vec<usize> = (0..numeric.len()).filter(|&p| p != t).collect();
        let row_features = |row: usize| -> Option<Vec<f64>> {
            predictors.iter().map(|&p| snapshot[p][row]).collect()
        };

        let mut features = Vec::new();
        let mut targets = Vec::new();
        for row in 0..rows {
            if let (Some(y), Some(x)) = (snapshot[t][row], row_features(row)) {
                features.push(x);
                targets.push(y);
            }
        }

        let min_rows = (predictors.len() + 1).max(2);
        let model = if !predictors.is_empty() && targets.len() >= min_rows {
            numeric::least_squares(&features, &targets)
        } else {
            None
        };
        if model.is_none() {
            tracing::debug!(
                "Falling back to mean imputation for column {}",
                dataset.columns()[target].name
            );
        }

        for row in 0..rows {
            if snapshot[t][row].is_some() || !dataset.rows()[row][target].is_missing() {
                continue;
            }
            let predicted = model.as_ref().and_then(|coef| {
                row_features(row).map(|x| {
                    coef[0] + x.iter().zip(&coef[1..]).map(|(xi, b)| xi * b).sum::<f64>()
                })
            });
            let value = predicted.filter(|v| v.is_finite()).unwrap_or(fallback);
            dataset.rows_mut()[row][target] = Cell::Float(value);
            filled += 1;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(strategy: CleaningStrategy) -> CleaningConfig {
        CleaningConfig {
            strategy,
            remove_duplicates: false,
            standardize_data: false,
        }
    }

    fn column(dataset: &Dataset, name: &str) -> Vec<Cell> {
        let idx = dataset.column_index(name).unwrap();
        dataset.cells(idx).cloned().collect()
    }

    fn sample() -> Dataset {
        Dataset::new(
            vec!["x".into(), "y".into(), "city".into()],
            vec![
                vec![Cell::Int(1), Cell::Int(10), Cell::Text("Oslo".into())],
                vec![Cell::Null, Cell::Int(20), Cell::Text("Rome".into())],
                vec![Cell::Int(3), Cell::Null, Cell::Null],
                vec![Cell::Int(8), Cell::Int(40), Cell::Text("Rome".into())],
            ],
        )
        .unwrap()
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(matches!(
            "magic".parse::<CleaningStrategy>(),
            Err(AnalyticsError::InvalidConfig(_))
        ));
        assert_eq!("ML".parse::<CleaningStrategy>().unwrap(), CleaningStrategy::MlPredict);
    }

    #[test]
    fn mean_fills_numeric_columns_only() {
        let (cleaned, result) = clean(&sample(), &config(CleaningStrategy::Mean));

        assert_eq!(result.missing_found, 3);
        assert_eq!(result.missing_filled, 2);
        assert_eq!(column(&cleaned, "x")[1], Cell::Float(4.0));
        assert!(cleaned.rows()[2][2].is_missing());
    }

    #[test]
    fn mean_leaves_complete_column_mean_unchanged() {
        let raw = sample();
        let before = numeric::mean(&raw.numeric_values(0)).unwrap();
        let (cleaned, _) = clean(&raw, &config(CleaningStrategy::Mean));
        let y_before = numeric::mean(&raw.numeric_values(1)).unwrap();
        let y_after = numeric::mean(&cleaned.numeric_values(1)).unwrap();

        assert!((numeric::mean(&cleaned.numeric_values(0)).unwrap() - before).abs() < 1e-12);
        assert!((y_after - y_before).abs() < 1e-12);
    }

    #[test]
    fn median_uses_observed_values() {
        let (cleaned, _) = clean(&sample(), &config(CleaningStrategy::Median));
        assert_eq!(column(&cleaned, "x")[1], Cell::Float(3.0));
        assert_eq!(column(&cleaned, "y")[2], Cell::Float(20.0));
    }

    #[test]
    fn mode_breaks_ties_by_first_value() {
        let ds = Dataset::new(
            vec!["c".into()],
            vec![
                vec![Cell::Text("b".into())],
                vec![Cell::Text("a".into())],
                vec![Cell::Null],
                vec![Cell::Text("a".into())],
                vec![Cell::Text("b".into())],
            ],
        )
        .unwrap();
        let (cleaned, result) = clean(&ds, &config(CleaningStrategy::Mode));
        assert_eq!(result.missing_filled, 1);
        assert_eq!(cleaned.rows()[2][0], Cell::Text("b".into()));
    }

    #[test]
    fn interpolation_is_linear_with_nearest_edges() {
        let ds = Dataset::new(
            vec!["v".into()],
            vec![
                vec![Cell::Null],
                vec![Cell::Int(2)],
                vec![Cell::Null],
                vec![Cell::Null],
                vec![Cell::Int(8)],
                vec![Cell::Null],
            ],
        )
        .unwrap();
        let (cleaned, result) = clean(&ds, &config(CleaningStrategy::Interpolation));
        assert_eq!(result.missing_filled, 4);
        assert_eq!(cleaned.numeric_values(0), vec![2.0, 2.0, 4.0, 6.0, 8.0, 8.0]);
    }

    #[test]
    fn ml_predicts_from_other_columns() {
        let ds = Dataset::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![Cell::Int(1), Cell::Int(3)],
                vec![Cell::Int(2), Cell::Int(5)],
                vec![Cell::Int(3), Cell::Int(7)],
                vec![Cell::Int(4), Cell::Null],
                vec![Cell::Null, Cell::Null],
            ],
        )
        .unwrap();
        let (cleaned, result) = clean(&ds, &config(CleaningStrategy::MlPredict));

        assert_eq!(result.missing_filled, 3);
        let b = cleaned.numeric_column(1);
        assert!((b[3].unwrap() - 9.0).abs() < 1e-9);
        // row 4 has no predictor value, so both cells fall back to the column means
        assert!((b[4].unwrap() - 5.0).abs() < 1e-9);
        assert!((cleaned.numeric_column(0)[4].unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn ml_falls_back_to_mean_without_training_rows() {
        let ds = Dataset::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![Cell::Int(1), Cell::Null],
                vec![Cell::Null, Cell::Int(4)],
                vec![Cell::Int(5), Cell::Int(6)],
            ],
        )
        .unwrap();
        let (cleaned, _) = clean(&ds, &config(CleaningStrategy::MlPredict));
        assert_eq!(cleaned.numeric_column(0)[1], Some(3.0));
        assert_eq!(cleaned.numeric_column(1)[0], Some(5.0));
    }

    #[test]
    fn remove_drops_incomplete_rows() {
        let raw = sample();
        let (cleaned, result) = clean(&raw, &config(CleaningStrategy::Remove));
        assert_eq!(result.missing_filled, 0);
        assert_eq!(result.final_rows, 2);
        assert!(result.final_rows <= raw.row_count());
        assert_eq!(cleaned.missing_count(), 0);
    }

    #[test]
    fn standardize_trims_and_coerces_numbers() {
        let ds = Dataset::new(
            vec!["amount".into(), "name".into()],
            vec![
                vec![Cell::Text(" 12 ".into()), Cell::Text(" Ann".into())],
                vec![Cell::Text("3.5".into()), Cell::Text("Bo ".into())],
            ],
        )
        .unwrap();
        assert_eq!(ds.columns()[0].kind, ColumnKind::Categorical);

        let (cleaned, _) = clean(
            &ds,
            &CleaningConfig {
                strategy: CleaningStrategy::Mean,
                remove_duplicates: false,
                standardize_data: true,
            },
        );
        assert_eq!(cleaned.columns()[0].kind, ColumnKind::Numeric);
        assert_eq!(cleaned.rows()[0][0], Cell::Int(12));
        assert_eq!(cleaned.rows()[1][0], Cell::Float(3.5));
        assert_eq!(cleaned.rows()[0][1], Cell::Text("Ann".into()));
    }

    #[test]
    fn duplicates_removed_before_imputation() {
        let ds = Dataset::new(
            vec!["a".into()],
            vec![vec![Cell::Null], vec![Cell::Null], vec![Cell::Int(2)], vec![Cell::Int(2)]],
        )
        .unwrap();
        let (cleaned, result) = clean(&ds, &CleaningConfig::default());
        assert_eq!(result.duplicates_removed, 2);
        assert_eq!(result.missing_found, 1);
        assert_eq!(result.missing_filled, 1);
        assert_eq!(cleaned.row_count(), 2);
        assert_eq!(result.strategy_used, CleaningStrategy::Mean);
    }
}
