use crate::config::Config;
use crate::models::Listing;
use crate::scrapers::traits::{PageSource, ScrapeError};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Canonical origin relative listing links are resolved against
pub const KIJIJI_ORIGIN: &str = "https://www.kijiji.ca";

const CARD: &str = r#"[data-testid="listing-card"]"#;

static CARD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(CARD));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[data-testid="listing-title"]"#));
static PRICE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[data-testid="listing-price"]"#));
static DESCRIPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[data-testid="listing-description"]"#));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"a[data-testid="listing-link"]"#));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("listing selectors are valid CSS")
}

/// Kijiji results-page fetcher. One client is shared by every search so
/// cookies set by earlier responses ride along on later requests.
pub struct KijijiScraper {
    client: Client,
}

impl KijijiScraper {
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent())
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for KijijiScraper {
    async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        debug!(url, "Fetching results page");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await?;
        debug!(url, bytes = html.len(), "Downloaded results page");
        Ok(html)
    }

    fn source_name(&self) -> &'static str {
        "Kijiji"
    }
}

/// Every listing card on a results page. An empty page is normal (no
/// matches, end of inventory) and just yields nothing.
pub fn extract_listing_cards<'a>(document: &'a Html, url: &str) -> Vec<ElementRef<'a>> {
    let cards: Vec<_> = document.select(&CARD_SELECTOR).collect();
    if cards.is_empty() {
        info!(url, selector = CARD, "No listing cards found");
    } else {
        debug!(url, count = cards.len(), "Found listing cards");
    }
    cards
}

/// Parse one listing card, stamped with today's date
pub fn parse_listing(card: ElementRef<'_>, beds: u32) -> Listing {
    parse_listing_on(card, beds, Local::now().date_naive())
}

/// Parse one listing card. Missing elements leave their field empty.
pub fn parse_listing_on(card: ElementRef<'_>, beds: u32, date: NaiveDate) -> Listing {
    let link = card
        .select(&LINK_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"));

    Listing {
        title: first_text(card, &TITLE_SELECTOR),
        price: first_text(card, &PRICE_SELECTOR),
        description: first_text(card, &DESCRIPTION_SELECTOR),
        link: normalize_link(link),
        date,
        beds,
    }
}

/// Parse every listing on a results page
pub fn parse_page(html: &str, url: &str, beds: u32) -> Vec<Listing> {
    let document = Html::parse_document(html);
    extract_listing_cards(&document, url)
        .into_iter()
        .map(|card| parse_listing(card, beds))
        .collect()
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let element = card.select(selector).next()?;
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Resolve a listing href against the Kijiji origin.
///
/// Links that already carry a scheme pass through, root-relative paths get
/// the origin prepended, and anything else is kept as found.
pub fn normalize_link(href: Option<&str>) -> Option<String> {
    let href = href.map(str::trim).filter(|h| !h.is_empty())?;

    if Url::parse(href).is_ok() {
        return Some(href.to_string());
    }
    if href.starts_with('/') {
        return Some(format!("{KIJIJI_ORIGIN}{href}"));
    }
    Some(href.to_string())
}
