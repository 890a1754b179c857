use std::collections::HashSet;
use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::utils::{clean_column_name, data_to_cell};
use crate::error::AppError;
use crate::services::dataset::{Cell, Dataset};

/// Reads the first non-empty worksheet of an `.xlsx`/`.xls` workbook into a dataset.
pub struct ExcelProcessor;

impl ExcelProcessor {
    pub fn read_first_sheet(file_data: Bytes) -> Result<Dataset, AppError> {
        tracing::info!("Processing Excel file ({} bytes)", file_data.len());
        let cursor = Cursor::new(file_data);

        let mut workbook = open_workbook_auto_from_rs(cursor)
            .map_err(|e| AppError::FileProcessingError(format!("Failed to open Excel file: {}", e)))?;

        let sheet_names = workbook.sheet_names().to_vec();
        tracing::debug!("Found {} sheets: {:?}", sheet_names.len(), sheet_names);

        for sheet_name in &sheet_names {
            match workbook.worksheet_range(sheet_name) {
                Ok(range) => {
                    let rows: Vec<Vec<Data>> = range.rows().map(|row| row.to_vec()).collect();
                    if rows.is_empty() {
                        tracing::warn!("Sheet {} is empty, skipping", sheet_name);
                        continue;
                    }
                    tracing::info!("Reading sheet {} with {} rows", sheet_name, rows.len() - 1);
                    return Self::rows_to_dataset(&rows);
                }
                Err(e) => {
                    tracing::warn!("Failed to read worksheet {}: {}", sheet_name, e);
                }
            }
        }

        Err(AppError::FileProcessingError("No valid data found in Excel file".to_string()))
    }

    /// The first row is the header; rows that are entirely empty are dropped.
    fn rows_to_dataset(rows: &[Vec<Data>]) -> Result<Dataset, AppError> {
        let mut existing_names = HashSet::new();
        let headers: Vec<String> = rows
            .first()
            .map(|row| {
                row.iter()
                    .map(|cell| clean_column_name(&cell.to_string(), &mut existing_names))
                    .collect()
            })
            .unwrap_or_default();

        if headers.is_empty() {
            return Err(AppError::InvalidInput("Empty data or headers".to_string()));
        }

        let body: Vec<Vec<Cell>> = rows
            .iter()
            .skip(1)
            .filter(|row| row.iter().any(|v| !matches!(v, Data::Empty)))
            .map(|row| row.iter().take(headers.len()).map(data_to_cell).collect())
            .collect();

        Ok(Dataset::new(headers, body)?)
    }
}
