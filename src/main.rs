mod config;
mod models;
mod pipeline;
mod scrapers;
mod storage;
mod triage;

use anyhow::Context;
use config::Config;
use pipeline::{Pipeline, SearchOutcome};
use scrapers::{default_searches, KijijiScraper};
use storage::{GoogleSheets, SheetStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🏠 Rental Watch - Kijiji listings tracker");

    let config = Config::from_env()?;
    let scraper = KijijiScraper::new(&config).context("Failed to create HTTP client")?;
    let store = GoogleSheets::new(&config).context("Failed to create Sheets client")?;
    let searches = default_searches();

    info!(
        searches = searches.len(),
        backend = store.backend_name(),
        delay_secs = config.request_delay.as_secs(),
        "Starting run"
    );

    let report = Pipeline::new(&scraper, &store, &searches)
        .with_delay(config.request_delay)
        .run()
        .await;

    for (key, outcome) in &report.outcomes {
        match outcome {
            SearchOutcome::Completed(triaged) => {
                info!("✅ {}: {} new listings", key, triaged.new_listings.len());
                if triaged.read_failed {
                    warn!("   dataset was unreadable, rows may have been duplicated");
                }
                for listing in &triaged.new_listings {
                    info!(
                        "   {} | {} | {}",
                        listing.price.as_deref().unwrap_or("-"),
                        listing.title.as_deref().unwrap_or("(untitled)"),
                        listing.link.as_deref().unwrap_or("-"),
                    );
                }
                for (step, reason) in &triaged.failed_writes {
                    warn!("   {} failed: {}", step, reason);
                }
            }
            SearchOutcome::Failed(reason) => warn!("❌ {}: {}", key, reason),
        }
    }

    info!("💾 {} new listings saved", report.total_new());

    Ok(())
}
