//! Decide which freshly scraped listings are new and persist them.
//!
//! A listing is new when it has a link and a price and its link is not yet in
//! the dataset. New listings are appended below the dataset's last row and
//! replace the contents of the latest-batch view. When nothing is new the view
//! is left as the previous run wrote it.

use std::collections::HashSet;
use std::fmt;

use tracing::{error, info, warn};

use crate::models::{Listing, LISTING_COLUMNS};
use crate::storage::{SheetStore, StoreError, Table};

/// Sheet mirroring the most recent batch of new listings
pub const LATEST_VIEW: &str = "New Listings";

/// Block blanked before the latest-batch view is rewritten
pub const LATEST_VIEW_CLEAR_RANGE: &str = "A1:Z1000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    Append,
    ClearLatest,
    WriteLatest,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStep::Append => write!(f, "append"),
            WriteStep::ClearLatest => write!(f, "clear latest view"),
            WriteStep::WriteLatest => write!(f, "write latest view"),
        }
    }
}

/// Outcome of one triage pass
#[derive(Debug, Clone, Default)]
pub struct TriageReport {
    /// Listings judged new, whether or not writing them succeeded
    pub new_listings: Vec<Listing>,
    /// The dataset could not be read and was treated as empty
    pub read_failed: bool,
    pub failed_writes: Vec<(WriteStep, String)>,
}

pub struct Triage<'a, S: SheetStore + ?Sized> {
    store: &'a S,
    latest_view: &'a str,
}

impl<'a, S: SheetStore + ?Sized> Triage<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            latest_view: LATEST_VIEW,
        }
    }

    pub fn with_latest_view(mut self, name: &'a str) -> Self {
        self.latest_view = name;
        self
    }

    /// Filter `fresh` down to unseen listings and persist them to `dataset`
    pub async fn run(&self, fresh: &[Listing], dataset: &str) -> TriageReport {
        let mut report = TriageReport::default();

        // `None` when the dataset exists but could not be read
        let existing = match self.store.read_all(dataset, &LISTING_COLUMNS).await {
            Ok(table) => Some(table),
            Err(StoreError::MissingSheet(_)) => {
                info!(dataset, "Dataset does not exist yet, it will be created");
                Some(Table::blank(&LISTING_COLUMNS))
            }
            Err(e) => {
                // Carry on as if empty: a repeat of this run may append duplicates.
                error!(dataset, error = %e, "Failed to read dataset, treating it as empty");
                report.read_failed = true;
                None
            }
        };

        let nothing = Table::blank(&LISTING_COLUMNS);
        report.new_listings = select_new(fresh, existing.as_ref().unwrap_or(&nothing));
        if report.new_listings.is_empty() {
            info!(dataset, fresh = fresh.len(), "No new listings");
            return report;
        }

        let rows: Vec<_> = report.new_listings.iter().map(Listing::to_row).collect();

        let appended = match &existing {
            Some(table) => {
                let start_row = table.last_row() + 1;
                self.store
                    .append_at(dataset, start_row, &LISTING_COLUMNS, &rows, !table.header_present)
                    .await
            }
            // Row count unknown: let the backend find the end of the data
            None => self.store.append_rows(dataset, &LISTING_COLUMNS, &rows).await,
        };
        match appended {
            Ok(()) => info!(dataset, count = rows.len(), "Appended new listings"),
            Err(e) => {
                error!(dataset, error = %e, "Failed to append new listings");
                report.failed_writes.push((WriteStep::Append, e.to_string()));
            }
        }

        if let Err(e) = self
            .store
            .clear_range(self.latest_view, LATEST_VIEW_CLEAR_RANGE)
            .await
        {
            warn!(sheet = self.latest_view, error = %e, "Failed to clear latest view");
            report.failed_writes.push((WriteStep::ClearLatest, e.to_string()));
        }

        if let Err(e) = self
            .store
            .append_at(self.latest_view, 1, &LISTING_COLUMNS, &rows, true)
            .await
        {
            error!(sheet = self.latest_view, error = %e, "Failed to write latest view");
            report.failed_writes.push((WriteStep::WriteLatest, e.to_string()));
        }

        report
    }
}

/// Fresh listings that have a price and a link not already in `existing`.
/// Repeated links within `fresh` keep their first occurrence.
pub fn select_new(fresh: &[Listing], existing: &Table) -> Vec<Listing> {
    let mut seen: HashSet<String> = existing
        .column("link")
        .map(|cell| cell.to_text().trim().to_string())
        .filter(|link| !link.is_empty())
        .collect();

    fresh
        .iter()
        .filter(|listing| listing.has_price())
        .filter(|listing| match listing.key() {
            Some(link) => seen.insert(link.to_string()),
            None => false,
        })
        .cloned()
        .collect()
}
