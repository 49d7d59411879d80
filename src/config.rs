use anyhow::{Context, Result};
use std::env;
use std::time::Duration;
use tracing::warn;

const DEFAULT_DELAY_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings read once at startup and handed to every component
#[derive(Debug, Clone)]
pub struct Config {
    /// Spreadsheet holding the datasets and the latest-batch view
    pub spreadsheet_id: String,
    /// OAuth access token for the Sheets API
    pub sheets_token: String,
    /// Contact address advertised in the User-Agent
    pub contact_email: Option<String>,
    /// Pause after every search request
    pub request_delay: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let contact_email = get("CONTACT_EMAIL");
        if contact_email.is_none() {
            warn!("CONTACT_EMAIL not set, requests will go out without a contact address");
        }

        Ok(Self {
            spreadsheet_id: get("SPREADSHEET_ID").context("SPREADSHEET_ID must be set")?,
            sheets_token: get("GOOGLE_SHEETS_TOKEN").context("GOOGLE_SHEETS_TOKEN must be set")?,
            contact_email,
            request_delay: Duration::from_secs(
                get("REQUEST_DELAY_SECS")
                    .map(|v| v.trim().parse())
                    .transpose()
                    .context("REQUEST_DELAY_SECS must be a whole number of seconds")?
                    .unwrap_or(DEFAULT_DELAY_SECS),
            ),
            request_timeout: Duration::from_secs(
                get("REQUEST_TIMEOUT_SECS")
                    .map(|v| v.trim().parse())
                    .transpose()
                    .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        })
    }

    /// User-Agent sent with every page request
    pub fn user_agent(&self) -> String {
        let base = concat!("rental-watch/", env!("CARGO_PKG_VERSION"));
        match &self.contact_email {
            Some(email) => format!("Mozilla/5.0 (compatible; {base}; +mailto:{email})"),
            None => format!("Mozilla/5.0 (compatible; {base})"),
        }
    }
}
