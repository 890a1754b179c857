use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use polars::prelude::*;
use reqwest::Client;

use crate::error::AppError;
use crate::services::dataset::{Cell, Dataset};
use crate::services::excel::ExcelProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Excel,
}

impl FileKind {
    pub fn from_filename(filename: &str) -> Result<Self, AppError> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        Self::from_tag(&extension)
    }

    /// Accepts a bare extension or type name such as `csv`, `xlsx` or `excel`.
    pub fn from_tag(tag: &str) -> Result<Self, AppError> {
        match tag.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Ok(FileKind::Csv),
            "xlsx" | "xls" | "excel" => Ok(FileKind::Excel),
            other => Err(AppError::InvalidInput(format!(
                "Unsupported file type '{}'; only CSV and Excel files are supported",
                other
            ))),
        }
    }
}

pub fn parse_file(kind: FileKind, file_data: Bytes) -> Result<Dataset, AppError> {
    if file_data.is_empty() {
        return Err(AppError::InvalidInput("Uploaded file is empty".to_string()));
    }
    match kind {
        FileKind::Csv => read_csv(file_data),
        FileKind::Excel => ExcelProcessor::read_first_sheet(file_data),
    }
}

fn read_csv(file_data: Bytes) -> Result<Dataset, AppError> {
    let df = CsvReader::new(Cursor::new(file_data))
        .has_header(true)
        .finish()?;
    tracing::info!("Parsed CSV with {} rows x {} columns", df.height(), df.width());
    dataframe_to_dataset(&df)
}

fn any_value_to_cell(value: AnyValue) -> Cell {
    match value {
        AnyValue::Null => Cell::Null,
        AnyValue::Boolean(b) => Cell::Bool(b),
        AnyValue::String(s) => Cell::Text(s.to_string()),
        AnyValue::Int8(v) => Cell::Int(v as i64),
        AnyValue::Int16(v) => Cell::Int(v as i64),
        AnyValue::Int32(v) => Cell::Int(v as i64),
        AnyValue::Int64(v) => Cell::Int(v),
        AnyValue::UInt8(v) => Cell::Int(v as i64),
        AnyValue::UInt16(v) => Cell::Int(v as i64),
        AnyValue::UInt32(v) => Cell::Int(v as i64),
        AnyValue::UInt64(v) => i64::try_from(v).map(Cell::Int).unwrap_or(Cell::Float(v as f64)),
        AnyValue::Float32(v) => Cell::Float(v as f64),
        AnyValue::Float64(v) => Cell::Float(v),
        other => Cell::Text(other.to_string()),
    }
}

pub fn dataframe_to_dataset(df: &DataFrame) -> Result<Dataset, AppError> {
    let headers: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let columns = df.get_columns();
    let mut rows = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut row = Vec::with_capacity(columns.len());
        for series in columns {
            row.push(any_value_to_cell(series.get(row_idx)?));
        }
        rows.push(row);
    }
    Ok(Dataset::new(headers, rows)?)
}

pub async fn load_file_from_url(url: &str) -> Result<Bytes, AppError> {
    let client = Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::HttpError(format!("Failed to fetch file: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::HttpError(format!(
            "Failed to fetch file. Status: {}",
            response.status()
        )));
    }

    response
        .bytes()
        .await
        .map_err(|e| AppError::HttpError(format!("Failed to read response bytes: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dataset::ColumnKind;

    #[test]
    fn file_kind_follows_extension() {
        assert_eq!(FileKind::from_filename("sales.CSV").unwrap(), FileKind::Csv);
        assert_eq!(FileKind::from_filename("book.xlsx").unwrap(), FileKind::Excel);
        assert_eq!(FileKind::from_tag("excel").unwrap(), FileKind::Excel);
        assert!(FileKind::from_filename("notes.txt").is_err());
        assert!(FileKind::from_filename("noext").is_err());
    }

    #[test]
    fn csv_bytes_become_typed_dataset() {
        let csv = "date,product,revenue\n2024-01-01,Laptop,1200.5\n2024-01-02,Mouse,\n2024-01-03,Laptop,80\n";
        let ds = parse_file(FileKind::Csv, Bytes::from(csv)).unwrap();
        assert_eq!(ds.headers(), vec!["date", "product", "revenue"]);
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.columns()[0].kind, ColumnKind::Datetime);
        assert_eq!(ds.columns()[1].kind, ColumnKind::Categorical);
        assert_eq!(ds.columns()[2].kind, ColumnKind::Numeric);
        assert_eq!(ds.missing_count(), 1);
    }

    #[test]
    fn empty_upload_is_rejected() {
        assert!(matches!(
            parse_file(FileKind::Csv, Bytes::new()),
            Err(AppError::InvalidInput(_))
        ));
    }
}
