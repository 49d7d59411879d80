use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::scrapers::kijiji::parse_page;
use crate::scrapers::{PageSource, SearchDefinition};
use crate::storage::SheetStore;
use crate::triage::{Triage, TriageReport, LATEST_VIEW};

/// What happened to one search during a run
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Completed(TriageReport),
    /// The search was abandoned and counts as zero new listings
    Failed(String),
}

impl SearchOutcome {
    pub fn new_listings(&self) -> usize {
        match self {
            SearchOutcome::Completed(report) => report.new_listings.len(),
            SearchOutcome::Failed(_) => 0,
        }
    }
}

/// Outcomes of a run keyed by search, in the order the searches ran
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<(String, SearchOutcome)>,
}

impl RunReport {
    pub fn get(&self, key: &str) -> Option<&SearchOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, outcome)| outcome)
    }

    pub fn total_new(&self) -> usize {
        self.outcomes.iter().map(|(_, o)| o.new_listings()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.outcomes.iter().filter_map(|(key, outcome)| match outcome {
            SearchOutcome::Failed(reason) => Some((key.as_str(), reason.as_str())),
            SearchOutcome::Completed(_) => None,
        })
    }
}

/// Drives every search through fetch, parse and triage, one at a time
pub struct Pipeline<'a, P: PageSource + ?Sized, S: SheetStore + ?Sized> {
    source: &'a P,
    store: &'a S,
    searches: &'a [SearchDefinition],
    delay: Duration,
    latest_view: &'a str,
}

impl<'a, P: PageSource + ?Sized, S: SheetStore + ?Sized> Pipeline<'a, P, S> {
    pub fn new(source: &'a P, store: &'a S, searches: &'a [SearchDefinition]) -> Self {
        Self {
            source,
            store,
            searches,
            delay: Duration::ZERO,
            latest_view: LATEST_VIEW,
        }
    }

    /// Pause after every search, the last one included
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_latest_view(mut self, name: &'a str) -> Self {
        self.latest_view = name;
        self
    }

    /// Run every search. Never fails: a search that errors is logged and
    /// recorded as failed, and the next one runs.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::default();

        for search in self.searches {
            let key = search.key();
            let outcome = match self.run_search(search).await {
                Ok(triaged) => SearchOutcome::Completed(triaged),
                Err(e) => {
                    let reason = format!("{e:#}");
                    error!(search = %key, url = %search.url, error = %reason, "Search failed");
                    SearchOutcome::Failed(reason)
                }
            };
            report.outcomes.push((key, outcome));

            tokio::time::sleep(self.delay).await;
        }

        info!(
            searches = report.outcomes.len(),
            new_listings = report.total_new(),
            failed = report.failures().count(),
            "Run finished"
        );
        report
    }

    async fn run_search(&self, search: &SearchDefinition) -> Result<TriageReport> {
        let html = self
            .source
            .fetch_page(&search.url)
            .await
            .with_context(|| format!("Failed to fetch {} page", self.source.source_name()))?;

        let fresh = parse_page(&html, &search.url, search.beds);
        info!(search = %search.key(), listings = fresh.len(), "Parsed results page");

        let triaged = Triage::new(self.store)
            .with_latest_view(self.latest_view)
            .run(&fresh, &search.dataset)
            .await;
        info!(
            search = %search.key(),
            new_listings = triaged.new_listings.len(),
            "Triaged listings"
        );
        Ok(triaged)
    }
}
