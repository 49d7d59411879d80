use crate::models::Region;

/// One saved search: where to look and where its results go
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDefinition {
    pub region: Region,
    /// Bedroom count stamped on every listing this search yields
    pub beds: u32,
    pub url: String,
    /// Persisted dataset new listings are appended to
    pub dataset: String,
}

impl SearchDefinition {
    pub fn new(region: Region, beds: u32, url: impl Into<String>) -> Self {
        Self {
            region,
            beds,
            url: url.into(),
            dataset: region.dataset().to_string(),
        }
    }

    /// Stable identifier used in logs and run reports, e.g. `west-2bed`
    pub fn key(&self) -> String {
        format!("{}-{}bed", self.region.slug(), self.beds)
    }
}

const SEARCH_BASE: &str = "https://www.kijiji.ca/b-apartments-condos/city-of-toronto";

fn search_url(beds: u32, address: &str) -> String {
    let slug = if beds == 1 {
        "1+bedroom".to_string()
    } else {
        format!("{beds}+bedrooms")
    };
    format!("{SEARCH_BASE}/{slug}/c37l1700273a27949001?address={address}&radius=3.0")
}

/// The saved searches, west side first then east side, each by bedroom count
pub fn default_searches() -> Vec<SearchDefinition> {
    let regions = [
        (Region::WestSide, "High%20Park%2C%20Toronto%2C%20ON"),
        (Region::EastSide, "Leslieville%2C%20Toronto%2C%20ON"),
    ];

    regions
        .iter()
        .flat_map(|&(region, address)| {
            (1..=3).map(move |beds| SearchDefinition::new(region, beds, search_url(beds, address)))
        })
        .collect()
}
