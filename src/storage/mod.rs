//! Tabular storage used as the listings database.
//!
//! A store holds named sheets. Row 1 of a sheet carries column headers and
//! data starts on row 2. Backends hand back raw cells; [`Table::from_grid`]
//! locates columns by header and coerces cells to the requested types so
//! comparisons don't depend on how a backend typed a value.

pub mod sheets;

#[cfg(test)]
pub mod memory;

pub use sheets::GoogleSheets;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use thiserror::Error;

/// Errors surfaced by a storage backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("sheet `{0}` does not exist")]
    MissingSheet(String),

    #[error("schema mismatch: {0}")]
    Schema(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Date,
    Integer,
}

/// A named, typed column of a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnType) -> Self {
        Self { name, kind }
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Integer(i64),
    Number(f64),
    Date(NaiveDate),
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(text) => CellValue::Text(text),
            None => CellValue::Empty,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

impl CellValue {
    /// Textual form of the cell. Whole numbers print without a fraction.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(text) => text.clone(),
            CellValue::Integer(n) => n.to_string(),
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Convert the cell to `kind`. Values that can't be converted keep their
    /// text so nothing read from a sheet is silently lost.
    pub fn coerce(self, kind: ColumnType) -> CellValue {
        if self.is_empty() {
            return CellValue::Empty;
        }

        match kind {
            ColumnType::Text => CellValue::Text(self.to_text()),
            ColumnType::Integer => match self {
                CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 => {
                    CellValue::Integer(n as i64)
                }
                CellValue::Text(text) => match text.trim().parse::<i64>() {
                    Ok(n) => CellValue::Integer(n),
                    Err(_) => CellValue::Text(text),
                },
                other => other,
            },
            ColumnType::Date => match self {
                CellValue::Text(text) => DATE_FORMATS
                    .iter()
                    .find_map(|format| NaiveDate::parse_from_str(text.trim(), format).ok())
                    .map(CellValue::Date)
                    .unwrap_or(CellValue::Text(text)),
                CellValue::Integer(serial) => serial_date(serial)
                    .map(CellValue::Date)
                    .unwrap_or(CellValue::Integer(serial)),
                CellValue::Number(serial) if serial.is_finite() => serial_date(serial as i64)
                    .map(CellValue::Date)
                    .unwrap_or(CellValue::Number(serial)),
                other => other,
            },
        }
    }
}

/// Spreadsheet serial day numbers count from 1899-12-30
fn serial_date(serial: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::try_days(serial)?)
}

/// Contents of a sheet, projected onto a set of typed columns
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<CellValue>>,
    /// Whether row 1 holds headers
    pub header_present: bool,
}

impl Table {
    /// A table for a sheet with nothing in it, not even headers
    pub fn blank(columns: &[Column]) -> Self {
        Self {
            columns: columns.to_vec(),
            rows: Vec::new(),
            header_present: false,
        }
    }

    /// Build a table from raw cells whose first row is the header.
    ///
    /// Columns are found by header name, case-insensitively, so the sheet may
    /// hold extra columns or use a different order.
    pub fn from_grid(grid: Vec<Vec<CellValue>>, columns: &[Column]) -> Result<Self, StoreError> {
        let mut grid = grid.into_iter();
        let header = match grid.next() {
            Some(header) if header.iter().any(|cell| !cell.is_empty()) => header,
            _ => return Ok(Self::blank(columns)),
        };

        let positions = columns
            .iter()
            .map(|column| {
                header
                    .iter()
                    .position(|cell| cell.to_text().trim().eq_ignore_ascii_case(column.name))
                    .ok_or_else(|| StoreError::Schema(format!("missing column `{}`", column.name)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows: Vec<Vec<CellValue>> = grid
            .map(|raw| {
                columns
                    .iter()
                    .zip(&positions)
                    .map(|(column, &idx)| {
                        raw.get(idx)
                            .cloned()
                            .unwrap_or(CellValue::Empty)
                            .coerce(column.kind)
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(Self {
            columns: columns.to_vec(),
            rows,
            header_present: true,
        })
    }

    /// 1-based index of the last row observed in the sheet, 0 when blank
    pub fn last_row(&self) -> u32 {
        if self.header_present {
            self.rows.len() as u32 + 1
        } else {
            0
        }
    }

    /// Cells of the named column, top to bottom
    pub fn column<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a CellValue> + 'a {
        let idx = self.columns.iter().position(|column| column.name == name);
        self.rows
            .iter()
            .filter_map(move |row| idx.and_then(|idx| row.get(idx)))
    }
}

/// Header cells for `columns`
pub fn header_row(columns: &[Column]) -> Vec<CellValue> {
    columns.iter().map(|column| CellValue::from(column.name)).collect()
}

/// Rows to write, optionally prefixed with the header row
pub fn grid_for_write(
    columns: &[Column],
    rows: &[Vec<CellValue>],
    include_headers: bool,
) -> Vec<Vec<CellValue>> {
    let mut grid = Vec::with_capacity(rows.len() + 1);
    if include_headers {
        grid.push(header_row(columns));
    }
    grid.extend(rows.iter().cloned());
    grid
}

/// Spreadsheet-like storage backend
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Read the whole sheet, projected onto `columns`
    async fn read_all(&self, sheet: &str, columns: &[Column]) -> Result<Table, StoreError>;

    /// Write `rows` starting at column A of `start_row` (1-based). Cells
    /// outside the written block are left alone.
    async fn append_at(
        &self,
        sheet: &str,
        start_row: u32,
        columns: &[Column],
        rows: &[Vec<CellValue>],
        include_headers: bool,
    ) -> Result<(), StoreError>;

    /// Add `rows` below the last non-empty row of the sheet, wherever that
    /// turns out to be. Used when the row count is not known.
    async fn append_rows(
        &self,
        sheet: &str,
        columns: &[Column],
        rows: &[Vec<CellValue>],
    ) -> Result<(), StoreError>;

    /// Blank every cell in an A1-notation range such as `A1:Z1000`. A sheet
    /// that does not exist has nothing to clear.
    async fn clear_range(&self, sheet: &str, range: &str) -> Result<(), StoreError>;

    /// Name of the backend, for logs
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LISTING_COLUMNS;

    fn text(value: &str) -> CellValue {
        CellValue::from(value)
    }

    #[test]
    fn numeric_link_compares_as_text() {
        assert_eq!(CellValue::Number(12345.0).coerce(ColumnType::Text), text("12345"));
        assert_eq!(CellValue::Integer(7).coerce(ColumnType::Text), text("7"));
        assert_eq!(text("  ").coerce(ColumnType::Text), CellValue::Empty);
    }

    #[test]
    fn dates_coerce_from_text_and_serials() {
        let expected = CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(text("2024-03-09").coerce(ColumnType::Date), expected);
        assert_eq!(text("03/09/2024").coerce(ColumnType::Date), expected);
        assert_eq!(CellValue::Number(45360.0).coerce(ColumnType::Date), expected);
        assert_eq!(text("soon").coerce(ColumnType::Date), text("soon"));
    }

    #[test]
    fn integers_coerce_from_numbers_and_text() {
        assert_eq!(CellValue::Number(2.0).coerce(ColumnType::Integer), CellValue::Integer(2));
        assert_eq!(text(" 3 ").coerce(ColumnType::Integer), CellValue::Integer(3));
        assert_eq!(text("studio").coerce(ColumnType::Integer), text("studio"));
    }

    #[test]
    fn grid_is_projected_by_header_name() {
        let grid = vec![
            vec![text("link"), text("beds"), text("Title"), text("price"), text("description"), text("date")],
            vec![CellValue::Number(42.0), CellValue::Number(1.0), text("Loft"), text("$1")],
        ];

        let table = Table::from_grid(grid, &LISTING_COLUMNS).unwrap();

        assert!(table.header_present);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.column("link").collect::<Vec<_>>(), vec![&text("42")]);
        assert_eq!(table.column("beds").collect::<Vec<_>>(), vec![&CellValue::Integer(1)]);
        assert_eq!(table.column("date").collect::<Vec<_>>(), vec![&CellValue::Empty]);
        assert_eq!(table.last_row(), 2);
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let grid = vec![vec![text("title"), text("price")]];
        let err = Table::from_grid(grid, &LISTING_COLUMNS).unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[test]
    fn blank_sheet_has_no_rows_at_all() {
        let table = Table::from_grid(Vec::new(), &LISTING_COLUMNS).unwrap();
        assert!(!table.header_present);
        assert_eq!(table.last_row(), 0);
    }

    #[test]
    fn headers_prefix_written_rows_on_request() {
        let rows = vec![vec![text("a")]];
        let with = grid_for_write(&LISTING_COLUMNS, &rows, true);
        assert_eq!(with.len(), 2);
        assert_eq!(with[0][4], text("link"));
        assert_eq!(grid_for_write(&LISTING_COLUMNS, &rows, false), rows);
    }
}
