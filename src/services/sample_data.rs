//! Seeded synthetic datasets for demos and tests. Each generator leaves a share of
//! cells empty so the cleaning engine has something to do.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::dataset::{Cell, Dataset};
use crate::error::AnalyticsError;

pub const MAX_SAMPLE_SIZE: usize = 10_000;

const PRODUCTS: [&str; 7] = ["Laptop", "Mouse", "Keyboard", "Monitor", "Tablet", "Phone", "Headphones"];
const REGIONS: [&str; 4] = ["North", "South", "East", "West"];
const SEGMENTS: [&str; 3] = ["Enterprise", "SMB", "Startup"];
const CATEGORIES: [&str; 3] = ["Electronics", "Office", "Accessories"];

const SALES_HEADERS: &[&str] = &["id", "product", "quantity", "price", "region", "date", "revenue", "customer_id"];
const CUSTOMER_HEADERS: &[&str] = &["customer_id", "name", "segment", "ltv", "acquisition_cost", "churn_risk"];
const INVENTORY_HEADERS: &[&str] = &["sku", "product_name", "category", "stock_level", "reorder_point", "unit_cost"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Sales,
    Customers,
    Inventory,
}

impl std::str::FromStr for SampleKind {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sales" => Ok(SampleKind::Sales),
            "customers" => Ok(SampleKind::Customers),
            "inventory" => Ok(SampleKind::Inventory),
            other => Err(AnalyticsError::InvalidConfig(format!(
                "unknown sample data type '{}', expected sales, customers or inventory",
                other
            ))),
        }
    }
}

fn money(rng: &mut StdRng, lo: f64, hi: f64) -> f64 {
    (rng.gen_range(lo..hi) * 100.0).round() / 100.0
}

fn pick(rng: &mut StdRng, options: &[&str]) -> Cell {
    Cell::Text(options.choose(rng).copied().unwrap_or_default().to_string())
}

pub fn generate(kind: SampleKind, size: usize, seed: u64) -> Result<Dataset, AnalyticsError> {
    if size == 0 || size > MAX_SAMPLE_SIZE {
        return Err(AnalyticsError::InvalidConfig(format!(
            "size must be between 1 and {}, got {}",
            MAX_SAMPLE_SIZE, size
        )));
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let (headers, rows): (&[&str], Vec<Vec<Cell>>) = match kind {
        SampleKind::Sales => {
            let base = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default();
            let rows = (0..size)
                .map(|i| {
                    let price = money(&mut rng, 100.0, 1100.0);
                    let quantity: i64 = rng.gen_range(1..=50);
                    let revenue = if rng.gen_bool(0.85) {
                        Cell::Float((price * quantity as f64 * 100.0).round() / 100.0)
                    } else {
                        Cell::Null
                    };
                    let date = base + Duration::days(rng.gen_range(0..=365));
                    let customer = if rng.gen_bool(0.1) {
                        Cell::Text(String::new())
                    } else {
                        Cell::Int(rng.gen_range(1..=1000))
                    };
                    vec![
                        Cell::Int(i as i64 + 1),
                        pick(&mut rng, &PRODUCTS),
                        Cell::Int(quantity),
                        Cell::Float(price),
                        pick(&mut rng, &REGIONS),
                        Cell::Text(date.format("%Y-%m-%d").to_string()),
                        revenue,
                        customer,
                    ]
                })
                .collect();
            (SALES_HEADERS, rows)
        }
        SampleKind::Customers => {
            let rows = (0..size)
                .map(|i| {
                    let acquisition = if rng.gen_bool(0.15) {
                        Cell::Null
                    } else {
                        Cell::Float(money(&mut rng, 100.0, 2100.0))
                    };
                    let churn = if rng.gen_bool(0.2) {
                        Cell::Text(String::new())
                    } else {
                        Cell::Float(money(&mut rng, 0.0, 0.3))
                    };
                    vec![
                        Cell::Int(i as i64 + 1),
                        Cell::Text(format!("Customer {}", i + 1)),
                        pick(&mut rng, &SEGMENTS),
                        Cell::Float(money(&mut rng, 5000.0, 55000.0)),
                        acquisition,
                        churn,
                    ]
                })
                .collect();
            (CUSTOMER_HEADERS, rows)
        }
        SampleKind::Inventory => {
            let rows = (0..size)
                .map(|i| {
                    let reorder = if rng.gen_bool(0.1) {
                        Cell::Null
                    } else {
                        Cell::Int(rng.gen_range(10..=60))
                    };
                    vec![
                        Cell::Text(format!("SKU{}", i + 1)),
                        Cell::Text(format!("Product {}", i + 1)),
                        pick(&mut rng, &CATEGORIES),
                        Cell::Int(rng.gen_range(0..=200)),
                        reorder,
                        Cell::Float(money(&mut rng, 1.0, 100.0)),
                    ]
                })
                .collect();
            (INVENTORY_HEADERS, rows)
        }
    };

    tracing::info!("Generated {} rows of {:?} sample data", size, kind);
    Dataset::new(headers.iter().map(|h| h.to_string()).collect(), rows)
}
