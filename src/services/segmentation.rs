use serde::Serialize;

use super::dataset::Dataset;
use super::numeric;
use crate::error::AnalyticsError;

const MAX_FEATURES: usize = 3;
const MAX_ITERATIONS: usize = 300;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentationResult {
    pub labels: Vec<String>,
    pub segments: Vec<usize>,
    pub percentages: Vec<f64>,
    pub algorithm: String,
    pub features_used: Vec<String>,
}

/// Lloyd's k-means with deterministic farthest-point seeding.
pub struct KMeans {
    k: usize,
    max_iterations: usize,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Returns the cluster index of each point. `points` must hold at least `k` rows.
    pub fn fit(&self, points: &[Vec<f64>]) -> Vec<usize> {
        let mut centroids = self.seed(points);
        let mut assignments = vec![usize::MAX; points.len()];

        for iteration in 0..self.max_iterations {
            let mut changed = false;
            for (i, point) in points.iter().enumerate() {
                let nearest = nearest_centroid(point, &centroids).0;
                if assignments[i] != nearest {
                    assignments[i] = nearest;
                    changed = true;
                }
            }
            if !changed {
                tracing::debug!("k-means converged after {} iterations", iteration);
                break;
            }

            let dims = points[0].len();
            let mut sums = vec![vec![0.0; dims]; self.k];
            let mut counts = vec![0usize; self.k];
            for (point, &cluster) in points.iter().zip(&assignments) {
                counts[cluster] += 1;
                for (s, v) in sums[cluster].iter_mut().zip(point) {
                    *s += v;
                }
            }
            for (cluster, sum) in sums.into_iter().enumerate() {
                // an emptied cluster keeps its previous centroid
                if counts[cluster] > 0 {
                    centroids[cluster] = sum.into_iter().map(|s| s / counts[cluster] as f64).collect();
                }
            }
        }

        assignments
    }

    fn seed(&self, points: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let mut centroids = vec![points[0].clone()];
        while centroids.len() < self.k {
            let mut best = 0;
            let mut best_distance = f64::NEG_INFINITY;
            for (i, point) in points.iter().enumerate() {
                let distance = nearest_centroid(point, &centroids).1;
                if distance > best_distance {
                    best = i;
                    best_distance = distance;
                }
            }
            centroids.push(points[best].clone());
        }
        centroids
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

/// Z-score each feature in place; zero-variance features are only centred.
fn standardize(points: &mut [Vec<f64>], dims: usize) {
    for d in 0..dims {
        let column: Vec<f64> = points.iter().map(|p| p[d]).collect();
        let mean = numeric::mean(&column).unwrap_or(0.0);
        let std = numeric::population_std(&column).unwrap_or(0.0);
        for point in points.iter_mut() {
            point[d] -= mean;
            if std > 0.0 {
                point[d] /= std;
            }
        }
    }
}

pub fn segment(dataset: &Dataset, n_clusters: usize) -> Result<SegmentationResult, AnalyticsError> {
    let features: Vec<usize> = dataset
        .numeric_column_indices()
        .into_iter()
        .take(MAX_FEATURES)
        .collect();
    if features.is_empty() {
        return Err(AnalyticsError::InsufficientFeatures);
    }

    let columns: Vec<Vec<Option<f64>>> = features.iter().map(|&c| dataset.numeric_column(c)).collect();
    let mut points: Vec<Vec<f64>> = (0..dataset.row_count())
        .filter_map(|row| columns.iter().map(|col| col[row]).collect::<Option<Vec<f64>>>())
        .collect();

    if n_clusters == 0 || n_clusters > points.len() {
        return Err(AnalyticsError::InvalidClusterCount {
            requested: n_clusters,
            available: points.len(),
        });
    }

    standardize(&mut points, features.len());
    let assignments = KMeans::new(n_clusters).fit(&points);

    let mut segments = vec![0usize; n_clusters];
    for cluster in assignments {
        segments[cluster] += 1;
    }
    segments.sort_by(|a, b| b.cmp(a));

    let total = points.len() as f64;
    let mut percentages: Vec<f64> = segments
        .iter()
        .map(|&count| numeric::round_to(count as f64 / total * 100.0, 1))
        .collect();
    if let Some((last, rest)) = percentages.split_last_mut() {
        *last = numeric::round_to(100.0 - rest.iter().sum::<f64>(), 1);
    }

    tracing::info!("Segmented {} rows into {} clusters", points.len(), n_clusters);
    Ok(SegmentationResult {
        labels: (1..=n_clusters).map(|i| format!("Segment {}", i)).collect(),
        segments,
        percentages,
        algorithm: "K-Means++".to_string(),
        features_used: features.iter().map(|&c| dataset.columns()[c].name.clone()).collect(),
    })
}
