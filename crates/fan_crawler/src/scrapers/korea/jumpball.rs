use fan_core::Candidate;
use scraper::{Html, Selector};

use super::REGION;
use crate::scrapers::utils::{self, ListingSelectors};
use crate::scrapers::{ExtractContext, PageParser, SourceMetadata};

pub struct JumpballParser {
    base_url: String,
    listing: ListingSelectors,
    published: Selector,
    body: Selector,
}

impl JumpballParser {
    const BASE_URL: &'static str = "https://www.jumpball.co.kr";

    pub fn new() -> Self {
        Self::with_base_url(Self::BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            listing: ListingSelectors::parse(
                "#section-list ul.type2 > li",
                "h4.titles a",
                "p.lead a",
                "a.thumb",
                ".pagination a",
            ),
            // Newer article views moved the date out of the info list into the byline.
            published: utils::selector(".info-group .infomation li, .article-view-header .byline em"),
            body: utils::selector("#article-view-content-div p"),
        }
    }
}

impl Default for JumpballParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PageParser for JumpballParser {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            id: "jumpball",
            name: "Jumpball",
            emoji: "⛹️",
            region: REGION,
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn total_pages(&self, document: &Html) -> u32 {
        utils::last_page(document, &self.listing)
    }

    fn extract_candidates(&self, document: &Html, ctx: &mut ExtractContext<'_>) -> Vec<Candidate> {
        utils::extract_listing(document, &self.listing, &self.base_url, ctx)
    }

    fn published_text(&self, document: &Html) -> Option<String> {
        utils::first_text_with_digits(document, &self.published)
    }

    fn article_body(&self, document: &Html) -> Option<String> {
        utils::joined_text(document, &self.body)
    }

    fn cli_names(&self) -> Vec<&str> {
        vec!["jumpball", "점프볼"]
    }
}
