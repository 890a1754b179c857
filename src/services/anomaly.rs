use serde::Serialize;
use smallvec::SmallVec;

use super::dataset::Dataset;
use super::numeric;
use crate::error::AnalyticsError;

/// Records kept per column in the returned list; the total count is never capped.
pub const MAX_ANOMALIES_PER_COLUMN: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub field: String,
    pub value: f64,
    pub mean: f64,
    #[serde(rename = "zScore")]
    pub z_score: f64,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyResult {
    pub threshold: f64,
    pub anomaly_count: usize,
    pub anomalies: Vec<Anomaly>,
}

/// Z-score detection per numeric column using the population standard deviation.
/// `index` refers to the row position in `dataset`.
pub fn detect_anomalies(dataset: &Dataset, threshold: f64) -> Result<AnomalyResult, AnalyticsError> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(AnalyticsError::InvalidConfig(format!(
            "threshold must be a non-negative number, got {}",
            threshold
        )));
    }

    let mut anomaly_count = 0;
    let mut anomalies = Vec::new();

    for idx in dataset.numeric_column_indices() {
        let column = dataset.numeric_column(idx);
        let observed: Vec<f64> = column.iter().flatten().copied().collect();
        let (Some(mean), Some(std)) = (numeric::mean(&observed), numeric::population_std(&observed)) else {
            continue;
        };
        if std == 0.0 {
            continue;
        }

        let field = &dataset.columns()[idx].name;
        let mut flagged: SmallVec<[Anomaly; MAX_ANOMALIES_PER_COLUMN]> = SmallVec::new();
        for (row, value) in column.iter().enumerate() {
            let Some(value) = *value else { continue };
            let z_score = (value - mean) / std;
            if z_score.abs() > threshold {
                anomaly_count += 1;
                if flagged.len() < MAX_ANOMALIES_PER_COLUMN {
                    flagged.push(Anomaly {
                        field: field.clone(),
                        value,
                        mean,
                        z_score,
                        index: row,
                    });
                }
            }
        }
        anomalies.extend(flagged);
    }

    tracing::debug!("Detected {} anomalies at threshold {}", anomaly_count, threshold);
    Ok(AnomalyResult {
        threshold,
        anomaly_count,
        anomalies,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierRecord {
    pub field: String,
    pub value: f64,
    pub mean: f64,
    pub z_score: f64,
    pub index: usize,
}

/// The cleaning-stage view of the same detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub total_outliers: usize,
    pub outliers: Vec<OutlierRecord>,
    pub threshold: f64,
}

impl From<AnomalyResult> for OutlierReport {
    fn from(result: AnomalyResult) -> Self {
        Self {
            total_outliers: result.anomaly_count,
            outliers: result
                .anomalies
                .into_iter()
                .map(|a| OutlierRecord {
                    field: a.field,
                    value: a.value,
                    mean: a.mean,
                    z_score: a.z_score.abs(),
                    index: a.index,
                })
                .collect(),
            threshold: result.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dataset::Cell;

    fn single_column(values: Vec<Cell>) -> Dataset {
        Dataset::new(vec!["a".into()], values.into_iter().map(|c| vec![c]).collect()).unwrap()
    }

    #[test]
    fn constant_column_has_no_anomalies() {
        let ds = single_column(vec![Cell::Int(7); 6]);
        for threshold in [0.0, 1.0, 3.0] {
            assert_eq!(detect_anomalies(&ds, threshold).unwrap().anomaly_count, 0);
        }
    }

    #[test]
    fn flags_extreme_value_with_row_index() {
        let mut cells: Vec<Cell> = (0..20).map(|i| Cell::Int(1 + i % 4)).collect();
        cells.insert(3, Cell::Null);
        cells.push(Cell::Int(100));
        let ds = single_column(cells);

        let result = detect_anomalies(&ds, 2.5).unwrap();
        assert_eq!(result.anomaly_count, 1);
        let anomaly = &result.anomalies[0];
        assert_eq!(anomaly.value, 100.0);
        assert_eq!(anomaly.index, 21);
        assert!(anomaly.z_score > 2.5);
    }

    #[test]
    fn five_point_column_z_is_bounded_by_two() {
        let ds = single_column([1, 2, 3, 4, 100].into_iter().map(Cell::Int).collect());
        let result = detect_anomalies(&ds, 1.5).unwrap();
        assert_eq!(result.anomaly_count, 1);
        assert_eq!(result.anomalies[0].mean, 22.0);
        assert_eq!(result.anomalies[0].index, 4);
        assert!(result.anomalies[0].z_score < 2.0);
    }

    #[test]
    fn list_is_capped_but_count_is_not() {
        let mut cells: Vec<Cell> = vec![Cell::Int(0); 40];
        cells.extend((0..7).map(|_| Cell::Int(100)));
        let result = detect_anomalies(&single_column(cells), 2.0).unwrap();
        assert_eq!(result.anomaly_count, 7);
        assert_eq!(result.anomalies.len(), MAX_ANOMALIES_PER_COLUMN);
    }

    #[test]
    fn rejects_negative_threshold() {
        let ds = single_column(vec![Cell::Int(1)]);
        assert!(matches!(detect_anomalies(&ds, -1.0), Err(AnalyticsError::InvalidConfig(_))));
    }
}
