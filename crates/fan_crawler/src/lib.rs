pub mod cli;
pub mod dedup;
pub mod enricher;
pub mod fetcher;
pub mod logging;
pub mod manager;
pub mod scheduler;
pub mod scrapers;

#[cfg(test)]
mod test_utils;

pub use cli::{handle_command, CrawlArgs, CrawlCommands};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use manager::{CrawlManager, CrawlOutcome, CrawlReport, CrawlRequest};
pub use scrapers::PageParser;

pub mod prelude {
    pub use super::manager::{CrawlManager, CrawlOutcome, CrawlRequest};
    pub use super::scrapers::PageParser;
    pub use fan_core::{Article, Error, Result};
}
