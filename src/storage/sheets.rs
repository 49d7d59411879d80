//! Google Sheets v4 backend.
//!
//! Uses the `values` endpoints for data and `batchUpdate` only to add a tab
//! the first time it is written. Reads come back unformatted (dates as
//! formatted strings). Writes go through `RAW` input so scraped text is stored
//! as typed: no formula evaluation, and prices like `$1,650.00` stay text.
//! Writing values never touches cell formatting.

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{grid_for_write, CellValue, Column, SheetStore, StoreError, Table};
use crate::config::Config;

const BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

const VALUE_INPUT_OPTION: &str = "RAW";

/// Client for one spreadsheet
pub struct GoogleSheets {
    client: Client,
    spreadsheet_id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangeBody<'a> {
    range: &'a str,
    major_dimension: &'static str,
    values: Vec<Vec<Value>>,
}

impl<'a> ValueRangeBody<'a> {
    fn new(range: &'a str, grid: &[Vec<CellValue>]) -> Self {
        Self {
            range,
            major_dimension: "ROWS",
            values: grid
                .iter()
                .map(|row| row.iter().map(cell_to_json).collect::<Vec<_>>())
                .collect(),
        }
    }
}

impl GoogleSheets {
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            spreadsheet_id: config.spreadsheet_id.clone(),
            token: config.sheets_token.clone(),
        })
    }

    /// URL of the spreadsheet itself, e.g. `{id}:batchUpdate`
    fn spreadsheet_url(&self, suffix: &str) -> Result<Url, StoreError> {
        let mut url = Url::parse(BASE_URL)
            .map_err(|e| StoreError::Schema(format!("bad base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Schema("base URL cannot take a path".to_string()))?
            .push(&format!("{}{suffix}", self.spreadsheet_id));
        Ok(url)
    }

    /// URL of `values/{range}{suffix}` with the range as one encoded segment
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, StoreError> {
        let mut url = self.spreadsheet_url("")?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Schema("base URL cannot take a path".to_string()))?
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    /// Like `values_url`, with the input option every write uses
    fn write_url(&self, range: &str, suffix: &str) -> Result<Url, StoreError> {
        let mut url = self.values_url(range, suffix)?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION);
        if suffix == ":append" {
            url.query_pairs_mut()
                .append_pair("insertDataOption", "INSERT_ROWS");
        }
        Ok(url)
    }

    async fn check(response: Response, sheet: &str) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(api_error(status.as_u16(), message, sheet))
    }

    async fn add_sheet(&self, sheet: &str) -> Result<(), StoreError> {
        let url = self.spreadsheet_url(":batchUpdate")?;

        info!(sheet, "Creating sheet");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&add_sheet_request(sheet))
            .send()
            .await?;
        Self::check(response, sheet).await?;
        Ok(())
    }

    async fn put_values(&self, sheet: &str, range: &str, grid: &[Vec<CellValue>]) -> Result<(), StoreError> {
        let url = self.write_url(range, "")?;
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(&ValueRangeBody::new(range, grid))
            .send()
            .await?;
        Self::check(response, sheet).await?;
        Ok(())
    }

    async fn post_append(&self, sheet: &str, range: &str, grid: &[Vec<CellValue>]) -> Result<(), StoreError> {
        let url = self.write_url(range, ":append")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&ValueRangeBody::new(range, grid))
            .send()
            .await?;
        Self::check(response, sheet).await?;
        Ok(())
    }
}

/// Quote a sheet name for A1 notation: `'listings - west side'!A2`
pub fn a1_range(sheet: &str, cells: &str) -> String {
    let quoted = format!("'{}'", sheet.replace('\'', "''"));
    if cells.is_empty() {
        quoted
    } else {
        format!("{quoted}!{cells}")
    }
}

/// The API answers a range naming an unknown tab with 400 "Unable to parse range"
fn api_error(status: u16, message: String, sheet: &str) -> StoreError {
    if status == 400 && message.contains("Unable to parse range") {
        StoreError::MissingSheet(sheet.to_string())
    } else {
        StoreError::Api { status, message }
    }
}

fn add_sheet_request(sheet: &str) -> Value {
    json!({
        "requests": [
            { "addSheet": { "properties": { "title": sheet } } }
        ]
    })
}

fn cell_from_json(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Empty,
        Value::String(text) => CellValue::Text(text),
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Integer(i),
            None => CellValue::Number(n.as_f64().unwrap_or_default()),
        },
        Value::Bool(b) => CellValue::Text(b.to_string()),
        other => CellValue::Text(other.to_string()),
    }
}

fn cell_to_json(cell: &CellValue) -> Value {
    match cell {
        CellValue::Empty => Value::String(String::new()),
        CellValue::Text(text) => Value::String(text.clone()),
        CellValue::Integer(n) => Value::from(*n),
        CellValue::Number(n) => Value::from(*n),
        CellValue::Date(date) => Value::String(date.format("%Y-%m-%d").to_string()),
    }
}

#[async_trait]
impl SheetStore for GoogleSheets {
    async fn read_all(&self, sheet: &str, columns: &[Column]) -> Result<Table, StoreError> {
        let mut url = self.values_url(&a1_range(sheet, ""), "")?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE")
            .append_pair("dateTimeRenderOption", "FORMATTED_STRING");

        debug!(sheet, "Reading sheet");
        let response = self.client.get(url).bearer_auth(&self.token).send().await?;
        let body: ValueRange = Self::check(response, sheet).await?.json().await?;

        let grid: Vec<Vec<CellValue>> = body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_from_json).collect::<Vec<_>>())
            .collect();
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
        let range = a1_range(sheet, &format!("A{}", start_row.max(1)));
        let grid = grid_for_write(columns, rows, include_headers);

        debug!(sheet, start_row, rows = rows.len(), "Writing rows");
        match self.put_values(sheet, &range, &grid).await {
            Err(StoreError::MissingSheet(_)) => {
                self.add_sheet(sheet).await?;
                self.put_values(sheet, &range, &grid).await
            }
            other => other,
        }
    }

    async fn append_rows(
        &self,
        sheet: &str,
        columns: &[Column],
        rows: &[Vec<CellValue>],
    ) -> Result<(), StoreError> {
        let range = a1_range(sheet, "A1");
        let grid = grid_for_write(columns, rows, false);

        debug!(sheet, rows = rows.len(), "Appending rows after the last one");
        match self.post_append(sheet, &range, &grid).await {
            Err(StoreError::MissingSheet(_)) => {
                self.add_sheet(sheet).await?;
                self.post_append(sheet, &range, &grid).await
            }
            other => other,
        }
    }

    async fn clear_range(&self, sheet: &str, range: &str) -> Result<(), StoreError> {
        let url = self.values_url(&a1_range(sheet, range), ":clear")?;

        debug!(sheet, range, "Clearing range");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&json!({}))
            .send()
            .await?;
        match Self::check(response, sheet).await {
            Ok(_) | Err(StoreError::MissingSheet(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn backend_name(&self) -> &'static str {
        "Google Sheets"
    }
}
