use std::collections::HashSet;

use fan_core::Candidate;
use scraper::Html;

pub mod korea;
use korea::jumpball::JumpballParser;
use korea::rookie::RookieParser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub emoji: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMetadata {
    /// Stable identifier used for collections, checkpoints and CLI/HTTP paths
    pub id: &'static str,
    pub name: &'static str,
    pub emoji: &'static str,
    pub region: Region,
}

/// How a listing item qualifies for the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InclusionPolicy {
    /// The query must appear in the title or summary
    #[default]
    TitleOrSummary,
    /// Also keep items whose article body mentions the query often enough
    DeepMatch { min_occurrences: u32 },
}

impl InclusionPolicy {
    pub fn is_deep(&self) -> bool {
        matches!(self, InclusionPolicy::DeepMatch { .. })
    }

    /// Final verdict once the detail page has been read.
    pub fn accepts(&self, candidate: &Candidate) -> bool {
        match self {
            InclusionPolicy::TitleOrSummary => candidate.matched,
            InclusionPolicy::DeepMatch { min_occurrences } => {
                candidate.matched
                    || candidate
                        .keyword_count
                        .is_some_and(|count| count >= (*min_occurrences).max(1))
            }
        }
    }
}

/// Inputs for extracting one listing page. `seen` carries links across the pages of a run.
pub struct ExtractContext<'a> {
    pub query: &'a str,
    pub exclude: &'a [String],
    pub policy: InclusionPolicy,
    pub seen: &'a mut HashSet<String>,
}

impl<'a> ExtractContext<'a> {
    pub fn is_excluded(&self, title: &str, summary: &str) -> bool {
        self.exclude
            .iter()
            .filter(|needle| !needle.is_empty())
            .any(|needle| title.contains(needle.as_str()) || summary.contains(needle.as_str()))
    }

    pub fn matches(&self, title: &str, summary: &str) -> bool {
        let query = self.query.trim().to_lowercase();
        !query.is_empty()
            && (title.to_lowercase().contains(&query) || summary.to_lowercase().contains(&query))
    }
}

/// Markup knowledge for one scraped site. Parsing never fails: missing
/// elements produce defaults so that a markup change degrades instead of aborting.
pub trait PageParser: Send + Sync {
    fn source_metadata(&self) -> SourceMetadata;

    /// Scheme and host the site's relative links resolve against
    fn base_url(&self) -> &str;

    fn search_url(&self) -> String {
        format!("{}/news/articleList.html", self.base_url().trim_end_matches('/'))
    }

    fn can_handle(&self, url: &str) -> bool {
        url.starts_with(self.base_url())
    }

    /// Number of result pages advertised by the first page, 1 when unknown
    fn total_pages(&self, document: &Html) -> u32;

    fn extract_candidates(&self, document: &Html, ctx: &mut ExtractContext<'_>) -> Vec<Candidate>;

    /// Free text around the publish timestamp of a detail page
    fn published_text(&self, document: &Html) -> Option<String>;

    fn article_body(&self, document: &Html) -> Option<String>;

    /// Offset the site prints its timestamps in
    fn utc_offset_secs(&self) -> i32 {
        korea::KST_OFFSET_SECS
    }

    /// Names accepted on the command line
    fn cli_names(&self) -> Vec<&str> {
        vec![self.source_metadata().id]
    }
}

pub type BoxedParser = Box<dyn PageParser>;
pub type ParserFactory = Box<dyn Fn() -> BoxedParser + Send + Sync>;

pub fn get_parser_factories() -> Vec<ParserFactory> {
    vec![
        Box::new(|| Box::new(RookieParser::new())),
        Box::new(|| Box::new(JumpballParser::new())),
    ]
}

/// Selector sets for the article-list markup both sites' CMS renders.
pub(crate) mod utils {
    use super::*;
    use lazy_static::lazy_static;
    use regex::Regex;
    use scraper::{ElementRef, Selector};
    use url::Url;

    lazy_static! {
        static ref PAGE_PARAM: Regex = Regex::new(r"[?&]page=(\d+)").unwrap();
        static ref BACKGROUND_URL: Regex =
            Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).unwrap();
    }

    pub struct ListingSelectors {
        pub item: Selector,
        pub title: Selector,
        pub summary: Selector,
        pub thumbnail: Selector,
        pub pagination: Selector,
    }

    impl ListingSelectors {
        pub fn parse(
            item: &str,
            title: &str,
            summary: &str,
            thumbnail: &str,
            pagination: &str,
        ) -> Self {
            Self {
                item: selector(item),
                title: selector(title),
                summary: selector(summary),
                thumbnail: selector(thumbnail),
                pagination: selector(pagination),
            }
        }
    }

    // Selectors are compile-time literals; a typo is a programming error caught by tests.
    pub fn selector(css: &str) -> Selector {
        Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {:?}: {:?}", css, e))
    }

    pub fn element_text(element: ElementRef<'_>) -> String {
        element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn absolute_url(base: &str, href: &str) -> Option<String> {
        let base = Url::parse(base).ok()?;
        base.join(href.trim()).ok().map(|url| url.to_string())
    }

    pub fn page_from_href(href: &str) -> Option<u32> {
        PAGE_PARAM
            .captures(href)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    pub fn background_image(style: &str) -> Option<&str> {
        if !style.contains("background") {
            return None;
        }
        BACKGROUND_URL
            .captures(style)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|url| !url.is_empty())
    }

    /// Thumbnail from a `background-image: url(...)` style, else from an `<img src>`.
    pub fn thumbnail_url(thumb: ElementRef<'_>, base: &str) -> Option<String> {
        let elements: Vec<ElementRef<'_>> = thumb.descendants().filter_map(ElementRef::wrap).collect();
        let from_style = elements
            .iter()
            .filter_map(|el| el.value().attr("style"))
            .find_map(background_image);
        let from_img = || {
            elements
                .iter()
                .filter(|el| el.value().name() == "img")
                .find_map(|el| el.value().attr("src"))
        };
        from_style
            .or_else(from_img)
            .and_then(|src| absolute_url(base, src))
    }

    /// Page index in the last pagination link, 1 if there is none or it has no index.
    pub fn last_page(document: &Html, selectors: &ListingSelectors) -> u32 {
        document
            .select(&selectors.pagination)
            .filter_map(|a| a.value().attr("href"))
            .last()
            .and_then(page_from_href)
            .filter(|page| *page > 0)
            .unwrap_or(1)
    }

    pub fn extract_listing(
        document: &Html,
        selectors: &ListingSelectors,
        base: &str,
        ctx: &mut ExtractContext<'_>,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for item in document.select(&selectors.item) {
            let Some(anchor) = item.select(&selectors.title).next() else {
                continue;
            };
            let title = element_text(anchor);
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if title.is_empty() {
                continue;
            }

            let summary = item
                .select(&selectors.summary)
                .next()
                .map(element_text)
                .unwrap_or_default();

            if ctx.is_excluded(&title, &summary) {
                tracing::debug!("Excluded listing item: {}", title);
                continue;
            }

            let matched = ctx.matches(&title, &summary);
            if !matched && !ctx.policy.is_deep() {
                continue;
            }

            let Some(link) = absolute_url(base, href) else {
                tracing::debug!("Unresolvable link {:?} for {}", href, title);
                continue;
            };
            if !ctx.seen.insert(link.clone()) {
                continue;
            }

            let image_url = item
                .select(&selectors.thumbnail)
                .next()
                .and_then(|thumb| thumbnail_url(thumb, base));

            candidates.push(Candidate {
                title,
                link,
                summary,
                image_url,
                matched,
                created_at: None,
                keyword_count: None,
            });
        }

        candidates
    }

    /// Text of the first element under `selector` that carries a timestamp-looking string.
    pub fn first_text_with_digits(document: &Html, selector: &Selector) -> Option<String> {
        document
            .select(selector)
            .map(element_text)
            .find(|text| text.chars().filter(char::is_ascii_digit).count() >= 8)
    }

    pub fn joined_text(document: &Html, selector: &Selector) -> Option<String> {
        let text = document
            .select(selector)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        (!text.is_empty()).then_some(text)
    }
}
