use chrono::NaiveDate;

use crate::storage::{CellValue, Column, ColumnType};

/// Neighbourhood grouping a set of searches feeds into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    WestSide,
    EastSide,
}

impl Region {
    pub fn slug(&self) -> &'static str {
        match self {
            Region::WestSide => "west",
            Region::EastSide => "east",
        }
    }

    /// Name of the persisted dataset this region's listings are appended to
    pub fn dataset(&self) -> &'static str {
        match self {
            Region::WestSide => "listings - west side",
            Region::EastSide => "listings - east side",
        }
    }
}

/// Stored column layout of a persisted dataset.
///
/// The order differs from the field order of [`Listing`] and must stay this
/// way for sheets written by earlier runs.
pub const LISTING_COLUMNS: [Column; 6] = [
    Column::new("title", ColumnType::Text),
    Column::new("price", ColumnType::Text),
    Column::new("description", ColumnType::Text),
    Column::new("date", ColumnType::Date),
    Column::new("link", ColumnType::Text),
    Column::new("beds", ColumnType::Integer),
];

/// One rental posting scraped from a search-results page
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub title: Option<String>,
    pub price: Option<String>,
    pub description: Option<String>,
    /// Absolute URL, the identity of a listing
    pub link: Option<String>,
    /// Day the listing was first observed
    pub date: NaiveDate,
    /// Bedroom count of the search that produced the listing
    pub beds: u32,
}

impl Listing {
    /// Link, if present and non-empty
    pub fn key(&self) -> Option<&str> {
        non_empty(self.link.as_deref())
    }

    pub fn has_price(&self) -> bool {
        non_empty(self.price.as_deref()).is_some()
    }

    /// Cells in [`LISTING_COLUMNS`] order
    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::from(self.title.clone()),
            CellValue::from(self.price.clone()),
            CellValue::from(self.description.clone()),
            CellValue::Date(self.date),
            CellValue::from(self.link.clone()),
            CellValue::Integer(i64::from(self.beds)),
        ]
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
