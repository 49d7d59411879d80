pub mod kijiji;
pub mod traits;
pub mod types;

pub use kijiji::KijijiScraper;
pub use traits::{PageSource, ScrapeError};
pub use types::{default_searches, SearchDefinition};
