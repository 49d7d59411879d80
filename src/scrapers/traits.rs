use async_trait::async_trait;
use thiserror::Error;

/// Why a results page could not be fetched
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Common trait for anything that hands back search-results pages.
/// The pipeline only needs the raw HTML; parsing stays with the caller.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page, a single attempt with no retries
    async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError>;

    /// Get the name of the listing source
    fn source_name(&self) -> &'static str;
}
