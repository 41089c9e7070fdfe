//! Assembled query results and their exports
//!
//! Flow:
//! 1. Each fetched page is pushed into a [`PageAccumulator`] in fetch order
//! 2. The first page fixes the column names and the schema summary
//! 3. `finish()` strips the pagination keys and yields a [`QueryResult`]
//! 4. Callers turn the result into a Polars DataFrame, records, or a file

use super::error::{DistillrError, Result};
use super::models::ResultPage;
use polars::prelude::*;
use rust_xlsxwriter::{Format, Workbook};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

/// Summary keys that only describe pagination
const PAGINATION_KEYS: [&str; 3] = ["page", "nextPage", "totalPages"];

/// A complete, concatenated result set
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    summary: Map<String, Value>,
}

impl QueryResult {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Schema metadata (column names, data types, row count), without paging keys
    pub fn summary(&self) -> &Map<String, Value> {
        &self.summary
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// All cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// One map per row, keyed by column name
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// Convert to a Polars DataFrame
    ///
    /// Column types are inferred from the JSON cells:
    /// - all integers → Int64
    /// - all numbers → Float64
    /// - all booleans → Boolean
    /// - anything else → String (non-string cells rendered as JSON text)
    ///
    /// Nulls are ignored for inference and kept as nulls. Integers beyond the
    /// Int64 range make the column a String column. Repeated column names get
    /// a numeric suffix (`a`, `a_1`, ...).
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = unique_names(&self.columns)
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let cells: Vec<&Value> = self.rows.iter().map(|row| &row[idx]).collect();
                Column::from(cells_to_series(name, &cells))
            })
            .collect();

        Ok(DataFrame::new(columns)?)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
        Ok(())
    }

    /// Write a JSON array of row objects
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        JsonWriter::new(&mut file)
            .with_json_format(JsonFormat::Json)
            .finish(&mut df)?;
        Ok(())
    }

    pub fn write_parquet(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut df = self.to_dataframe()?;
        let file = File::create(path)?;
        ParquetWriter::new(file).finish(&mut df)?;
        Ok(())
    }

    /// Write a single-sheet workbook: a bold header row, then one row per record
    ///
    /// Numbers and booleans keep their type; nulls are left as empty cells.
    pub fn write_excel(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let header = Format::new().set_bold();

        for (col, name) in self.columns.iter().enumerate() {
            sheet.write_string_with_format(0, excel_col(col)?, name.as_str(), &header)?;
        }
        for (idx, row) in self.rows.iter().enumerate() {
            let r = u32::try_from(idx + 1)
                .map_err(|_| DistillrError::Config("too many rows for an Excel sheet".into()))?;
            for (col, cell) in row.iter().enumerate() {
                let c = excel_col(col)?;
                match cell {
                    Value::Null => {}
                    Value::Bool(b) => {
                        sheet.write_boolean(r, c, *b)?;
                    }
                    Value::Number(n) => match n.as_f64() {
                        Some(f) => {
                            sheet.write_number(r, c, f)?;
                        }
                        None => {
                            sheet.write_string(r, c, n.to_string())?;
                        }
                    },
                    Value::String(text) => {
                        sheet.write_string(r, c, text.as_str())?;
                    }
                    other => {
                        sheet.write_string(r, c, other.to_string())?;
                    }
                }
            }
        }

        workbook.save(path.as_ref())?;
        Ok(())
    }

    /// Write to `path`, picking the format from its extension (csv, json, parquet, xlsx)
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => self.write_csv(path),
            "json" => self.write_json(path),
            "parquet" | "pq" => self.write_parquet(path),
            "xlsx" => self.write_excel(path),
            other => Err(DistillrError::Config(format!(
                "Unsupported output format '{}' for {}",
                other,
                path.display()
            ))),
        }
    }
}

fn excel_col(idx: usize) -> Result<u16> {
    u16::try_from(idx)
        .map_err(|_| DistillrError::Config("too many columns for an Excel sheet".into()))
}

/// Column names with repeats suffixed so every name is distinct
fn unique_names(columns: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    columns
        .iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut n = 0;
            while taken.contains(&candidate) {
                n += 1;
                candidate = format!("{}_{}", name, n);
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}

fn cells_to_series(name: &str, cells: &[&Value]) -> Series {
    let present = || cells.iter().filter(|v| !v.is_null());
    let has_values = present().next().is_some();
    // Unsigned integers above i64::MAX would lose digits as Float64
    let oversized = present().any(|v| v.is_u64() && !v.is_i64());

    if has_values && present().all(|v| v.is_i64()) {
        let values: Vec<Option<i64>> = cells.iter().map(|v| v.as_i64()).collect();
        Series::new(name.into(), values)
    } else if has_values && !oversized && present().all(|v| v.is_number()) {
        let values: Vec<Option<f64>> = cells.iter().map(|v| v.as_f64()).collect();
        Series::new(name.into(), values)
    } else if has_values && present().all(|v| v.is_boolean()) {
        let values: Vec<Option<bool>> = cells.iter().map(|v| v.as_bool()).collect();
        Series::new(name.into(), values)
    } else {
        let values: Vec<Option<String>> = cells
            .iter()
            .map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect();
        Series::new(name.into(), values)
    }
}

/// Collects result pages in fetch order
pub(crate) struct PageAccumulator {
    columns: Option<Vec<String>>,
    summary: Map<String, Value>,
    rows: Vec<Vec<Value>>,
    pages: usize,
}

impl PageAccumulator {
    pub fn new() -> Self {
        PageAccumulator {
            columns: None,
            summary: Map::new(),
            rows: Vec::new(),
            pages: 0,
        }
    }

    /// Append one page. `url` is only used for error reporting.
    pub fn push(&mut self, url: &str, page: ResultPage) -> Result<()> {
        if self.columns.is_none() {
            let columns = page.column_names().ok_or_else(|| {
                DistillrError::server(url, "summary.columnNames missing from result page", None)
            })?;
            self.columns = Some(columns);
            self.summary = page.summary;
        }
        let width = self.columns.as_ref().map_or(0, Vec::len);

        for (idx, row) in page.results.iter().enumerate() {
            if row.len() != width {
                return Err(DistillrError::server(
                    url,
                    format!(
                        "row {} of page {} has {} cells, expected {}",
                        idx + 1,
                        self.pages + 1,
                        row.len(),
                        width
                    ),
                    None,
                ));
            }
        }

        self.rows.extend(page.results);
        self.pages += 1;
        Ok(())
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn finish(self) -> QueryResult {
        let mut summary = self.summary;
        for key in PAGINATION_KEYS {
            summary.remove(key);
        }
        QueryResult {
            columns: self.columns.unwrap_or_default(),
            rows: self.rows,
            summary,
        }
    }
}
