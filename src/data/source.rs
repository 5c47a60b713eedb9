use std::path::{Path, PathBuf};

use polars::prelude::*;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::data::csv_io::read_csv;
use crate::error::DataError;

/// Upstream record source. Opened once per run and closed explicitly when
/// the run ends.
pub trait DataSource {
    fn describe(&self) -> String;
    fn fetch_table(&self) -> Result<DataFrame, DataError>;
    fn close(&mut self) -> Result<(), DataError>;
}

pub struct SqliteSource {
    conn: Option<Connection>,
    location: String,
    table: String,
}

impl SqliteSource {
    pub fn open(path: &Path, table: impl Into<String>) -> Result<Self, DataError> {
        let conn = Connection::open(path)?;
        info!("opened sqlite source {}", path.display());
        Ok(Self::from_connection(
            conn,
            path.display().to_string(),
            table,
        ))
    }

    pub fn from_connection(
        conn: Connection,
        location: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            conn: Some(conn),
            location: location.into(),
            table: table.into(),
        }
    }

    fn conn(&self) -> Result<&Connection, DataError> {
        self.conn.as_ref().ok_or(DataError::Closed)
    }

    fn table_exists(&self) -> Result<bool, DataError> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            params![self.table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

impl DataSource for SqliteSource {
    fn describe(&self) -> String {
        format!("sqlite:{}#{}", self.location, self.table)
    }

    fn fetch_table(&self) -> Result<DataFrame, DataError> {
        if !self.table_exists()? {
            return Err(DataError::UnknownTable(self.table.clone()));
        }
        let sql = format!("SELECT * FROM \"{}\"", self.table.replace('"', "\"\""));
        let mut stmt = self.conn()?.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
        let mut columns: Vec<SqlColumn> = vec![SqlColumn::default(); names.len()];

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (idx, column) in columns.iter_mut().enumerate() {
                column.push(row.get_ref(idx)?);
            }
        }
        debug!(
            "fetched {} rows from {}",
            columns.first().map(|c| c.text.len()).unwrap_or(0),
            self.describe()
        );

        let columns = names
            .into_iter()
            .zip(columns)
            .map(|(name, column)| column.into_column(&name))
            .collect();
        Ok(DataFrame::new(columns)?)
    }

    fn close(&mut self) -> Result<(), DataError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| DataError::Sqlite(err))?;
            info!("closed sqlite source {}", self.location);
        }
        Ok(())
    }
}

/// One result column, kept as numbers while every value is numeric.
#[derive(Debug, Clone, Default)]
struct SqlColumn {
    numeric: Vec<Option<f64>>,
    text: Vec<Option<String>>,
    has_text: bool,
}

impl SqlColumn {
    fn push(&mut self, value: ValueRef<'_>) {
        let (number, text) = match value {
            ValueRef::Null => (None, None),
            ValueRef::Integer(v) => (Some(v as f64), Some(v.to_string())),
            ValueRef::Real(v) if v.is_nan() => (None, None),
            ValueRef::Real(v) => (Some(v), Some(v.to_string())),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                self.has_text = true;
                (None, Some(String::from_utf8_lossy(bytes).into_owned()))
            }
        };
        self.numeric.push(number);
        self.text.push(text);
    }

    fn into_column(self, name: &str) -> Column {
        if self.has_text {
            Series::new(name.into(), self.text).into()
        } else {
            Series::new(name.into(), self.numeric).into()
        }
    }
}

pub struct CsvSource {
    path: PathBuf,
    open: bool,
}

impl CsvSource {
    pub fn open(path: &Path) -> Result<Self, DataError> {
        if !path.exists() {
            return Err(DataError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "source file missing"),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            open: true,
        })
    }
}

impl DataSource for CsvSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn fetch_table(&self) -> Result<DataFrame, DataError> {
        if !self.open {
            return Err(DataError::Closed);
        }
        read_csv(&self.path)
    }

    fn close(&mut self) -> Result<(), DataError> {
        self.open = false;
        Ok(())
    }
}
