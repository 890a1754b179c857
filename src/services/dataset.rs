//! In-memory tabular dataset: cells, inferred column kinds and row access.
//!
//! Every row holds exactly one [`Cell`] per column, in column order. Column kinds are
//! inferred from the non-missing cells and refreshed whenever the cleaning engine
//! builds a new dataset.

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AnalyticsError;

static NUMERIC_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").expect("numeric literal pattern")
});

static MONTH_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}$").expect("month pattern"));

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%d-%m-%Y"];

/// Parses a date under the small set of accepted formats.
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    if MONTH_ONLY.is_match(s) {
        return NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0));
    }
    None
}

pub fn is_month_only(raw: &str) -> bool {
    MONTH_ONLY.is_match(raw.trim())
}

/// Matches the numeric grammar and stays finite as an `f64` ("1e400" does not).
pub fn is_numeric_literal(raw: &str) -> bool {
    NUMERIC_LITERAL.is_match(raw) && raw.parse::<f64>().map_or(false, f64::is_finite)
}

/// A single value of the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Hashable identity of a cell, used for duplicate detection and mode counting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Missing,
    Bool(bool),
    Number(u64),
    Text(String),
}

impl Cell {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(*b),
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => Value::from(*f),
            Cell::Text(s) => Value::String(s.clone()),
        }
    }

    /// Null, NaN and blank text all count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Float(f) => f.is_nan(),
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Bool(_) | Cell::Int(_) => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) if f.is_finite() => Some(*f),
            Cell::Text(s) if is_numeric_literal(s.trim()) => {
                s.trim().parse().ok().filter(|f: &f64| f.is_finite())
            }
            _ => None,
        }
    }

    pub fn key(&self) -> CellKey {
        if self.is_missing() {
            return CellKey::Missing;
        }
        match self {
            Cell::Bool(b) => CellKey::Bool(*b),
            Cell::Int(i) => CellKey::Number(normalized_bits(*i as f64)),
            Cell::Float(f) => CellKey::Number(normalized_bits(*f)),
            Cell::Text(s) => CellKey::Text(s.clone()),
            Cell::Null => CellKey::Missing,
        }
    }
}

fn normalized_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Datetime,
    Categorical,
}

pub fn infer_kind<'a>(cells: impl Iterator<Item = &'a Cell>) -> ColumnKind {
    let mut seen = false;
    let mut numeric = true;
    let mut datetime = true;

    for cell in cells.filter(|c| !c.is_missing()) {
        seen = true;
        match cell {
            Cell::Int(_) | Cell::Float(_) => datetime = false,
            Cell::Text(s) => {
                if numeric && !is_numeric_literal(s) {
                    numeric = false;
                }
                if datetime && parse_date(s).is_none() {
                    datetime = false;
                }
            }
            Cell::Bool(_) | Cell::Null => {
                numeric = false;
                datetime = false;
            }
        }
        if !numeric && !datetime {
            break;
        }
    }

    match () {
        _ if !seen => ColumnKind::Categorical,
        _ if numeric => ColumnKind::Numeric,
        _ if datetime => ColumnKind::Datetime,
        _ => ColumnKind::Categorical,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// Builds a dataset from a header row and cell rows. Short rows are padded with
    /// `Null`; rows wider than the header are rejected.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, AnalyticsError> {
        let mut seen = HashSet::new();
        for name in &headers {
            if !seen.insert(name.as_str()) {
                return Err(AnalyticsError::InvalidDataset(format!("duplicate column name {}", name)));
            }
        }

        let width = headers.len();
        let mut normalized = Vec::with_capacity(rows.len());
        for (idx, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(AnalyticsError::InvalidDataset(format!(
                    "row {} has {} cells but only {} columns are defined",
                    idx,
                    row.len(),
                    width
                )));
            }
            row.resize(width, Cell::Null);
            normalized.push(row);
        }

        let mut dataset = Self {
            columns: headers
                .into_iter()
                .map(|name| Column { name, kind: ColumnKind::Categorical })
                .collect(),
            rows: normalized,
        };
        dataset.refresh_kinds();
        Ok(dataset)
    }

    /// Column order is the first-seen key order across all rows.
    pub fn from_json_rows(records: &[Map<String, Value>]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        let mut known = HashSet::new();
        for record in records {
            for key in record.keys() {
                if known.insert(key.clone()) {
                    headers.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                headers
                    .iter()
                    .map(|h| record.get(h).map(Cell::from_json).unwrap_or(Cell::Null))
                    .collect()
            })
            .collect();

        let mut dataset = Self {
            columns: headers
                .into_iter()
                .map(|name| Column { name, kind: ColumnKind::Categorical })
                .collect(),
            rows,
        };
        dataset.refresh_kinds();
        dataset
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn total_cells(&self) -> usize {
        self.row_count() * self.column_count()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric_column_indices(&self) -> Vec<usize> {
        self.columns_of_kind(ColumnKind::Numeric)
    }

    pub fn columns_of_kind(&self, kind: ColumnKind) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == kind)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn cells(&self, column: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[column])
    }

    /// Per-row numeric view of a column; `None` where the cell is missing or not a number.
    pub fn numeric_column(&self, column: usize) -> Vec<Option<f64>> {
        self.cells(column).map(Cell::as_f64).collect()
    }

    /// Non-missing numeric values of a column, in row order.
    pub fn numeric_values(&self, column: usize) -> Vec<f64> {
        self.cells(column).filter_map(Cell::as_f64).collect()
    }

    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| cell.is_missing())
            .count()
    }

    pub fn row_to_json(&self, row: &[Cell]) -> Map<String, Value> {
        self.columns
            .iter()
            .zip(row.iter())
            .map(|(col, cell)| (col.name.clone(), cell.to_json()))
            .collect()
    }

    pub fn to_json_rows(&self, limit: Option<usize>) -> Vec<Value> {
        let take = limit.unwrap_or(self.rows.len());
        self.rows
            .iter()
            .take(take)
            .map(|row| Value::Object(self.row_to_json(row)))
            .collect()
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<Cell>> {
        &mut self.rows
    }

    pub(crate) fn refresh_kinds(&mut self) {
        for idx in 0..self.columns.len() {
            let kind = infer_kind(self.rows.iter().map(|row| &row[idx]));
            self.columns[idx].kind = kind;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn infers_column_kinds() {
        let ds = Dataset::from_json_rows(&records(json!([
            {"id": 1, "price": "10.5", "date": "2025-01-03", "region": "North"},
            {"id": 2, "price": null, "date": "2025-02-11", "region": "South"},
            {"id": 3, "price": "7", "date": "", "region": "12"},
        ])));

        let kinds: Vec<ColumnKind> = ds.columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Numeric,
                ColumnKind::Numeric,
                ColumnKind::Datetime,
                ColumnKind::Categorical
            ]
        );
    }

    #[test]
    fn padded_text_is_not_numeric_until_trimmed() {
        let ds = Dataset::from_json_rows(&records(json!([{"v": " 12 "}, {"v": "3"}])));
        assert_eq!(ds.columns()[0].kind, ColumnKind::Categorical);
        assert_eq!(ds.numeric_values(0), vec![12.0, 3.0]);
    }

    #[test]
    fn overflowing_text_is_not_numeric() {
        assert_eq!(Cell::Text("1e400".into()).as_f64(), None);
        assert_eq!(Cell::Text("-1e400".into()).as_f64(), None);
        assert_eq!(Cell::Text("1e300".into()).as_f64(), Some(1e300));

        let ds = Dataset::from_json_rows(&records(json!([{"v": "1e400"}, {"v": 2}])));
        assert_eq!(ds.columns()[0].kind, ColumnKind::Categorical);
        assert!(ds.numeric_values(0).iter().all(|v| v.is_finite()));
    }

    #[test]
    fn missing_keys_become_null_cells() {
        let ds = Dataset::from_json_rows(&records(json!([{"a": 1}, {"b": "x"}])));
        assert_eq!(ds.headers(), vec!["a", "b"]);
        assert_eq!(ds.rows()[0], vec![Cell::Int(1), Cell::Null]);
        assert_eq!(ds.missing_count(), 2);
    }

    #[test]
    fn json_rows_round_trip_in_order() {
        let input = records(json!([
            {"name": "Alice", "age": 30, "score": 1.5, "active": true, "note": null},
            {"name": "Bob", "age": 41, "score": 2.25, "active": false, "note": "x"},
        ]));
        let ds = Dataset::from_json_rows(&input);
        let output: Vec<Value> = ds.to_json_rows(None);
        let expected: Vec<Value> = input.into_iter().map(Value::Object).collect();
        assert_eq!(output, expected);
    }

    #[test]
    fn rejects_duplicate_headers_and_wide_rows() {
        let dup = Dataset::new(vec!["a".into(), "a".into()], vec![]);
        assert!(matches!(dup, Err(AnalyticsError::InvalidDataset(_))));

        let wide = Dataset::new(vec!["a".into()], vec![vec![Cell::Int(1), Cell::Int(2)]]);
        assert!(matches!(wide, Err(AnalyticsError::InvalidDataset(_))));
    }

    #[test]
    fn parses_supported_date_formats() {
        assert!(parse_date("2025-03-04").is_some());
        assert!(parse_date("03/04/2025").is_some());
        assert!(parse_date("2025-03-04 10:11:12").is_some());
        assert!(parse_date("2025-03").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
