use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{types::ValueRef, Connection, OpenFlags};
use tracing::{debug, error, info};

use crate::error::{AnalyticsError, AppError};
use crate::services::dataset::{Cell, Dataset};

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("table name pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Sqlite,
}

impl std::str::FromStr for DbType {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DbType::Sqlite),
            other => Err(AnalyticsError::InvalidConfig(format!(
                "unsupported database type '{}', only sqlite is available",
                other
            ))),
        }
    }
}

/// Reads whole tables out of a SQLite database. All calls block; run them on
/// `spawn_blocking` from async code.
pub struct DbLoader {
    conn: Connection,
}

impl DbLoader {
    pub fn open(connection_string: &str) -> Result<Self, AppError> {
        let path = connection_string.trim_start_matches("sqlite://");
        info!("Opening SQLite database at {}", path);
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| {
                error!("Failed to open database {}: {}", path, e);
                AppError::DatabaseError(e.to_string())
            })?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn load_table(&self, table_name: &str) -> Result<Dataset, AppError> {
        if !TABLE_NAME.is_match(table_name) {
            return Err(AppError::InvalidInput(format!("Invalid table name '{}'", table_name)));
        }

        let sql = format!("SELECT * FROM \"{}\"", table_name);
        debug!("Loading table with: {}", sql);
        let mut stmt = self.conn.prepare(&sql)?;
        let headers: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let mut rows = stmt.query([])?;
        let mut body = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(headers.len());
            for i in 0..headers.len() {
                cells.push(match row.get_ref(i)? {
                    ValueRef::Null => Cell::Null,
                    ValueRef::Integer(i) => Cell::Int(i),
                    ValueRef::Real(f) => Cell::Float(f),
                    ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
                    ValueRef::Blob(_) => Cell::Null,
                });
            }
            body.push(cells);
        }

        info!("Loaded {} rows from table {}", body.len(), table_name);
        Ok(Dataset::new(headers, body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> DbLoader {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE sales (id INTEGER, product TEXT, price REAL);
             INSERT INTO sales VALUES (1, 'Laptop', 999.5), (2, NULL, 20.0), (3, 'Mouse', NULL);",
        )
        .unwrap();
        DbLoader::from_connection(conn)
    }

    #[test]
    fn reads_rows_and_nulls() {
        let ds = loader().load_table("sales").unwrap();
        assert_eq!(ds.headers(), vec!["id", "product", "price"]);
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.missing_count(), 2);
        assert_eq!(ds.rows()[0][2], Cell::Float(999.5));
    }

    #[test]
    fn rejects_unsafe_table_names() {
        assert!(matches!(
            loader().load_table("sales; DROP TABLE sales"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(loader().load_table("missing"), Err(AppError::DatabaseError(_))));
    }

    #[test]
    fn only_sqlite_is_supported() {
        assert_eq!("SQLite".parse::<DbType>().unwrap(), DbType::Sqlite);
        assert!("postgres".parse::<DbType>().is_err());
    }
}
