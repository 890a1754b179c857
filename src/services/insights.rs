use serde::Serialize;

use super::correlation::CorrelationMatrix;
use super::dataset::{ColumnKind, Dataset};
use super::numeric;
use super::quality::QualityMetrics;
use super::statistics::{self, StatSummary};
use super::trend::ColumnSelectionPolicy;

/// Below this many rows no insight or recommendation is produced.
pub const MIN_ROWS_FOR_INSIGHTS: usize = 5;

const STRONG_CORRELATION: f64 = 0.7;
const MAX_CORRELATION_INSIGHTS: usize = 3;
const SKEW_THRESHOLD: f64 = 1.0;
const GROWTH_THRESHOLD: f64 = 5.0;
const SCALE_ROW_THRESHOLD: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub icon: String,
    pub text: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub icon: String,
    pub title: String,
    pub detail: String,
    pub confidence: u8,
}

/// Everything the generators read, all derived from the same dataset. `growth_rate`
/// is absent when no forecast could be made.
pub struct InsightContext<'a> {
    pub dataset: &'a Dataset,
    pub quality: &'a QualityMetrics,
    pub summary: &'a [StatSummary],
    pub correlation: Option<&'a CorrelationMatrix>,
    pub growth_rate: Option<f64>,
}

impl InsightContext<'_> {
    fn duplicate_ratio(&self) -> f64 {
        let rows = self.dataset.row_count();
        if rows == 0 {
            0.0
        } else {
            self.quality.duplicate_count as f64 / rows as f64
        }
    }

    fn strong_pairs(&self) -> Vec<(String, String, f64)> {
        self.correlation
            .map(|m| m.strong_pairs(STRONG_CORRELATION))
            .unwrap_or_default()
    }
}

fn confidence(value: f64, cap: f64) -> u8 {
    value.min(cap).max(0.0).round() as u8
}

fn insight(icon: &str, text: String, confidence: u8) -> Insight {
    Insight {
        icon: icon.to_string(),
        text,
        confidence,
    }
}

/// First categorical column whose lowercase name contains any of `keywords`.
fn categorical_column(dataset: &Dataset, keywords: &[&str]) -> Option<usize> {
    dataset
        .columns_of_kind(ColumnKind::Categorical)
        .into_iter()
        .find(|&idx| {
            let name = dataset.columns()[idx].name.to_lowercase();
            keywords.iter().any(|k| name.contains(k))
        })
}

/// Numeric column picked by the value keywords only, with no positional fallback.
fn value_column(dataset: &Dataset) -> Option<usize> {
    let policy = ColumnSelectionPolicy::default();
    let idx = policy.value_column(dataset)?;
    let name = dataset.columns()[idx].name.to_lowercase();
    policy
        .value_keywords
        .iter()
        .any(|k| name.contains(k.as_str()))
        .then_some(idx)
}

/// Most frequent value of a column and its share of all rows, in percent.
fn dominant_value(dataset: &Dataset, column: usize) -> Option<(String, usize, f64)> {
    let name = &dataset.columns()[column].name;
    let table = statistics::categorical(dataset, name).ok()?;
    let label = table.labels.first()?.clone();
    let count = *table.values.first()?;
    Some((label, count, count as f64 / dataset.row_count() as f64 * 100.0))
}

pub fn insights(ctx: &InsightContext) -> Vec<Insight> {
    let dataset = ctx.dataset;
    if dataset.row_count() < MIN_ROWS_FOR_INSIGHTS {
        return Vec::new();
    }
    let mut out = Vec::new();

    if ctx.quality.missing_count == 0 {
        out.push(insight(
            "✅",
            "Data quality is excellent with no missing values detected. The dataset is ready for advanced analytics.".to_string(),
            98,
        ));
    } else {
        out.push(insight(
            "🔍",
            format!(
                "{} missing values found ({:.2}% complete). Clean the dataset before relying on predictive results.",
                ctx.quality.missing_count, ctx.quality.completeness
            ),
            confidence(50.0 + ctx.quality.completeness / 2.0, 99.0),
        ));
    }

    let ratio = ctx.duplicate_ratio();
    if ratio > 0.0 {
        out.push(insight(
            "♻️",
            format!(
                "{} duplicate rows detected ({:.1}% of records). Removing them avoids double counting.",
                ctx.quality.duplicate_count,
                ratio * 100.0
            ),
            confidence(60.0 + 200.0 * ratio, 99.0),
        ));
    }

    for (a, b, r) in ctx.strong_pairs().into_iter().take(MAX_CORRELATION_INSIGHTS) {
        let direction = if r > 0.0 { "positive" } else { "negative" };
        out.push(insight(
            "🔗",
            format!("Strong {} correlation between {} and {} (r = {:.2}).", direction, a, b, r),
            confidence(50.0 + 10.0 * r.abs(), 99.0),
        ));
    }

    for stat in ctx.summary {
        let Some(idx) = dataset.column_index(&stat.field) else { continue };
        let Some(skew) = numeric::skewness(&dataset.numeric_values(idx)) else { continue };
        if skew.abs() > SKEW_THRESHOLD {
            let tail = if skew > 0.0 { "right" } else { "left" };
            out.push(insight(
                "📐",
                format!(
                    "{} is {}-skewed (skewness {:.2}); the median ({:.2}) describes it better than the mean ({:.2}).",
                    stat.field, tail, skew, stat.median, stat.mean
                ),
                confidence(60.0 + 10.0 * skew.abs(), 95.0),
            ));
        }
    }

    if let Some(growth) = ctx.growth_rate.filter(|g| g.abs() > GROWTH_THRESHOLD) {
        let (icon, verb) = if growth > 0.0 { ("📈", "growth") } else { ("📉", "decline") };
        out.push(insight(
            icon,
            format!("The linear trend projects {:.1}% {} over the forecast horizon.", growth.abs(), verb),
            confidence(60.0 + growth.abs() / 2.0, 95.0),
        ));
    }

    if let Some(idx) = value_column(dataset) {
        let values = dataset.numeric_values(idx);
        if let Some(avg) = numeric::mean(&values) {
            let high = values.iter().filter(|&&v| v > avg * 1.2).count();
            let pct = high as f64 / values.len() as f64 * 100.0;
            out.push(insight(
                "💰",
                format!(
                    "{} averages {:.2} per record. {} high-value records ({:.0}%) sit more than 20% above average.",
                    dataset.columns()[idx].name,
                    avg,
                    high,
                    pct
                ),
                92,
            ));
        }
    }

    let categories: [(&[&str], &str, &str, u8); 3] = [
        (&["customer", "segment"], "👥", "segment", 88),
        (&["product", "category"], "📦", "product", 85),
        (&["region", "location"], "🌍", "region", 89),
    ];
    for (keywords, icon, noun, conf) in categories {
        let Some(idx) = categorical_column(dataset, keywords) else { continue };
        if let Some((label, _, pct)) = dominant_value(dataset, idx) {
            out.push(insight(
                icon,
                format!("{} is the leading {} with {:.1}% of records.", label, noun, pct),
                conf,
            ));
        }
    }

    out.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    tracing::debug!("Generated {} insights", out.len());
    out
}

pub fn recommendations(ctx: &InsightContext) -> Vec<Recommendation> {
    let dataset = ctx.dataset;
    if dataset.row_count() < MIN_ROWS_FOR_INSIGHTS {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut push = |icon: &str, title: String, detail: String, confidence: u8| {
        out.push(Recommendation {
            icon: icon.to_string(),
            title,
            detail,
            confidence,
        })
    };

    if let Some(idx) = value_column(dataset) {
        let values = dataset.numeric_values(idx);
        if let Some(avg) = numeric::mean(&values) {
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let high = values.iter().filter(|&&v| v > avg * 1.5).count();
            push(
                "💰",
                format!(
                    "Focus on high-value transactions ({:.1}% are 50%+ above average)",
                    high as f64 / values.len() as f64 * 100.0
                ),
                format!("Average: {:.2} | Top: {:.2} | Potential: +{:.2}", avg, max, avg * 0.15),
                88,
            );
        }
    }

    if let Some(idx) = categorical_column(dataset, &["product", "category", "segment"]) {
        if let Some((label, count, pct)) = dominant_value(dataset, idx) {
            push(
                "📊",
                format!("Expand \"{}\" ({:.1}% share)", label, pct),
                format!("{} records | Growth potential: {} units", count, count / 4),
                85,
            );
        }
    }

    let missing = dataset.missing_count();
    if missing > 0 {
        push(
            "🔍",
            format!("Improve data collection ({} values to validate)", missing),
            "Validate values at the source to improve prediction quality".to_string(),
            92,
        );
    }

    let ratio = ctx.duplicate_ratio();
    if ratio > 0.0 {
        push(
            "♻️",
            format!("Deduplicate records ({} duplicates)", ctx.quality.duplicate_count),
            "Run cleaning with duplicate removal before reporting totals".to_string(),
            confidence(70.0 + 200.0 * ratio, 99.0),
        );
    }

    let rows = dataset.row_count();
    if rows > SCALE_ROW_THRESHOLD {
        push(
            "📈",
            format!("Scale operations to handle {}+ more transactions", rows * 18 / 100),
            format!("Current: {} records | Plan capacity ahead of growth", rows),
            79,
        );
    }

    if let Some((a, b, r)) = ctx.strong_pairs().into_iter().next() {
        push(
            "🔗",
            format!("Investigate the link between {} and {}", a, b),
            format!("Pearson r = {:.2}; one may be a useful predictor of the other", r),
            confidence(50.0 + 10.0 * r.abs(), 99.0),
        );
    }

    out.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::correlation::correlate;
    use crate::services::dataset::Cell;
    use crate::services::quality::assess;

    fn sales(rows: usize) -> Dataset {
        let regions = ["North", "North", "South", "East"];
        Dataset::new(
            vec!["revenue".into(), "units".into(), "region".into()],
            (0..rows)
                .map(|i| {
                    vec![
                        Cell::Float(100.0 + 10.0 * i as f64),
                        Cell::Int(10 + i as i64),
                        Cell::Text(regions[i % regions.len()].into()),
                    ]
                })
                .collect(),
        )
        .unwrap()
    }

    fn with_context<T>(ds: &Dataset, f: impl FnOnce(&InsightContext) -> T) -> T {
        let quality = assess(ds);
        let summary = statistics::summarize(ds);
        let correlation = correlate(ds).ok();
        let ctx = InsightContext {
            dataset: ds,
            quality: &quality,
            summary: &summary,
            correlation: correlation.as_ref(),
            growth_rate: Some(12.0),
        };
        f(&ctx)
    }

    #[test]
    fn small_datasets_produce_nothing() {
        let ds = sales(4);
        assert!(with_context(&ds, insights).is_empty());
        assert!(with_context(&ds, recommendations).is_empty());
    }

    #[test]
    fn insights_are_sorted_and_bounded() {
        let ds = sales(12);
        let list = with_context(&ds, insights);
        assert!(!list.is_empty());
        assert!(list.windows(2).all(|w| w[0].confidence >= w[1].confidence));
        assert!(list.iter().all(|i| i.confidence <= 100));

        let icons: Vec<&str> = list.iter().map(|i| i.icon.as_str()).collect();
        assert_eq!(icons[0], "✅");
        assert!(icons.contains(&"🔗"));
        assert!(icons.contains(&"📈"));
        assert!(icons.contains(&"💰"));
        assert!(icons.contains(&"🌍"));
    }

    #[test]
    fn missing_values_lower_quality_confidence() {
        let ds = Dataset::new(
            vec!["a".into()],
            (0..10)
                .map(|i| vec![if i < 2 { Cell::Null } else { Cell::Int(i) }])
                .collect(),
        )
        .unwrap();
        let list = with_context(&ds, insights);
        let quality = list.iter().find(|i| i.icon == "🔍").unwrap();
        assert_eq!(quality.confidence, 90);
    }

    #[test]
    fn recommendations_cover_duplicates_and_collection() {
        let mut rows: Vec<Vec<Cell>> = (0..8).map(|i| vec![Cell::Int(i), Cell::Null]).collect();
        rows.push(rows[0].clone());
        rows.push(vec![Cell::Int(20), Cell::Text("x".into())]);
        let ds = Dataset::new(vec!["a".into(), "b".into()], rows).unwrap();

        let list = with_context(&ds, recommendations);
        let titles: Vec<&str> = list.iter().map(|r| r.icon.as_str()).collect();
        assert!(titles.contains(&"🔍"));
        assert!(titles.contains(&"♻️"));
        assert!(list.windows(2).all(|w| w[0].confidence >= w[1].confidence));

        let dedupe = list.iter().find(|r| r.icon == "♻️").unwrap();
        assert_eq!(dedupe.confidence, 90);
    }

    #[test]
    fn large_datasets_get_scale_recommendation() {
        let ds = sales(120);
        let list = with_context(&ds, recommendations);
        let scale = list.iter().find(|r| r.confidence == 79).unwrap();
        assert!(scale.title.contains("21+"));
    }
}
