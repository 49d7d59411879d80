use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{grid_for_write, CellValue, Column, SheetStore, StoreError, Table};

/// In-memory sheet store with switchable failures, used by tests
#[derive(Default)]
pub struct MemoryStore {
    sheets: Mutex<HashMap<String, Vec<Vec<CellValue>>>>,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
    writes: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a sheet with raw cells
    pub fn with_sheet(self, name: &str, grid: Vec<Vec<CellValue>>) -> Self {
        self.sheets.lock().unwrap().insert(name.to_string(), grid);
        self
    }

    pub fn fail_reads(&self, sheet: &str) {
        self.failing_reads.lock().unwrap().insert(sheet.to_string());
    }

    pub fn fail_writes(&self, sheet: &str) {
        self.failing_writes.lock().unwrap().insert(sheet.to_string());
    }

    /// Raw cells of a sheet, `None` if it was never created
    pub fn grid(&self, name: &str) -> Option<Vec<Vec<CellValue>>> {
        self.sheets.lock().unwrap().get(name).cloned()
    }

    /// Every write attempted so far, as `"<op> <sheet>"`
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn check_write(&self, op: &str, sheet: &str) -> Result<(), StoreError> {
        self.writes.lock().unwrap().push(format!("{op} {sheet}"));
        if self.failing_writes.lock().unwrap().contains(sheet) {
            return Err(StoreError::Api {
                status: 503,
                message: format!("{op} rejected"),
            });
        }
        Ok(())
    }
}

/// Parse the row bounds of an A1 range like `A1:Z1000`
fn row_bounds(range: &str) -> (usize, usize) {
    let row_of = |cell: &str| {
        cell.trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .parse::<usize>()
            .unwrap_or(1)
    };
    match range.split_once(':') {
        Some((start, end)) => (row_of(start), row_of(end)),
        None => (row_of(range), row_of(range)),
    }
}

#[async_trait]
impl SheetStore for MemoryStore {
    async fn read_all(&self, sheet: &str, columns: &[Column]) -> Result<Table, StoreError> {
        if self.failing_reads.lock().unwrap().contains(sheet) {
            return Err(StoreError::Api {
                status: 500,
                message: "backend unavailable".to_string(),
            });
        }
        let grid = self
            .grid(sheet)
            .ok_or_else(|| StoreError::MissingSheet(sheet.to_string()))?;
        Table::from_grid(grid, columns)
    }

    async fn append_at(
        &self,
        sheet: &str,
        start_row: u32,
        columns: &[Column],
        rows: &[Vec<CellValue>],
        include_headers: bool,
    ) -> Result<(), StoreError> {
        self.check_write("append", sheet)?;

        let mut sheets = self.sheets.lock().unwrap();
        let grid = sheets.entry(sheet.to_string()).or_default();
        let start = start_row.max(1) as usize - 1;
        for (offset, row) in grid_for_write(columns, rows, include_headers)
            .into_iter()
            .enumerate()
        {
            let idx = start + offset;
            if grid.len() <= idx {
                grid.resize(idx + 1, Vec::new());
            }
            grid[idx] = row;
        }
        Ok(())
    }

    async fn append_rows(
        &self,
        sheet: &str,
        columns: &[Column],
        rows: &[Vec<CellValue>],
    ) -> Result<(), StoreError> {
        self.check_write("append_rows", sheet)?;

        let mut sheets = self.sheets.lock().unwrap();
        let grid = sheets.entry(sheet.to_string()).or_default();
        while grid.last().is_some_and(|row| row.is_empty()) {
            grid.pop();
        }
        grid.extend(grid_for_write(columns, rows, false));
        Ok(())
    }

    async fn clear_range(&self, sheet: &str, range: &str) -> Result<(), StoreError> {
        self.check_write("clear", sheet)?;

        let (first, last) = row_bounds(range);
        let mut sheets = self.sheets.lock().unwrap();
        if let Some(grid) = sheets.get_mut(sheet) {
            for row in grid.iter_mut().take(last).skip(first.saturating_sub(1)) {
                row.clear();
            }
            while grid.last().is_some_and(|row| row.is_empty()) {
                grid.pop();
            }
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ColumnType;

    const COLUMNS: [Column; 1] = [Column::new("link", ColumnType::Text)];

    #[test]
    fn range_rows_are_parsed() {
        assert_eq!(row_bounds("A1:Z1000"), (1, 1000));
        assert_eq!(row_bounds("B7"), (7, 7));
    }

    #[tokio::test]
    async fn append_writes_at_requested_row() {
        let store = MemoryStore::new();
        let rows = vec![vec![CellValue::from("x")]];

        store.append_at("s", 1, &COLUMNS, &rows, true).await.unwrap();
        store.append_at("s", 3, &COLUMNS, &rows, false).await.unwrap();

        let table = store.read_all("s", &COLUMNS).await.unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.last_row(), 3);
    }

    #[tokio::test]
    async fn append_rows_goes_below_existing_rows() {
        let store = MemoryStore::new().with_sheet(
            "s",
            vec![
                vec![CellValue::from("link")],
                vec![CellValue::from("old1")],
                vec![CellValue::from("old2")],
            ],
        );

        store
            .append_rows("s", &COLUMNS, &[vec![CellValue::from("new")]])
            .await
            .unwrap();

        let table = store.read_all("s", &COLUMNS).await.unwrap();
        let links: Vec<_> = table.column("link").map(CellValue::to_text).collect();
        assert_eq!(links, ["old1", "old2", "new"]);
    }

    #[tokio::test]
    async fn clear_drops_cells_in_range() {
        let store = MemoryStore::new().with_sheet(
            "s",
            vec![vec![CellValue::from("link")], vec![CellValue::from("x")]],
        );

        store.clear_range("s", "A1:Z1000").await.unwrap();

        assert_eq!(store.grid("s"), Some(Vec::new()));
    }

    #[tokio::test]
    async fn unknown_sheet_fails_to_read() {
        let err = MemoryStore::new().read_all("nope", &COLUMNS).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingSheet(_)));
    }
}
