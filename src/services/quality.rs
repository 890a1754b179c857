use std::collections::HashSet;

use serde::Serialize;

use super::dataset::{CellKey, Dataset};
use super::numeric::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QualityScore {
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub missing_count: usize,
    pub total_cells: usize,
    pub duplicate_count: usize,
    pub quality_score: QualityScore,
}

pub fn assess(dataset: &Dataset) -> QualityMetrics {
    let total_cells = dataset.total_cells();
    let missing_count = dataset.missing_count();
    let duplicate_count = duplicate_count(dataset);

    let completeness = if total_cells > 0 {
        round_to(100.0 * (1.0 - missing_count as f64 / total_cells as f64), 2)
    } else {
        0.0
    };

    let quality_score = match () {
        _ if completeness >= 95.0 && duplicate_count == 0 => QualityScore::Good,
        _ if completeness >= 80.0 => QualityScore::Fair,
        _ => QualityScore::Poor,
    };

    tracing::debug!(
        "Quality assessed: completeness={}, missing={}, duplicates={}",
        completeness,
        missing_count,
        duplicate_count
    );

    QualityMetrics {
        completeness,
        missing_count,
        total_cells,
        duplicate_count,
        quality_score,
    }
}

/// Rows that exactly repeat an earlier row across every column.
pub fn duplicate_count(dataset: &Dataset) -> usize {
    let mut seen: HashSet<Vec<CellKey>> = HashSet::with_capacity(dataset.row_count());
    dataset
        .rows()
        .iter()
        .filter(|row| !seen.insert(row.iter().map(|c| c.key()).collect()))
        .count()
}
