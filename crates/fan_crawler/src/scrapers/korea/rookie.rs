use fan_core::Candidate;
use scraper::{Html, Selector};

use super::REGION;
use crate::scrapers::utils::{self, ListingSelectors};
use crate::scrapers::{ExtractContext, PageParser, SourceMetadata};

pub struct RookieParser {
    base_url: String,
    listing: ListingSelectors,
    published: Selector,
    body: Selector,
}

impl RookieParser {
    const BASE_URL: &'static str = "https://www.rookie.co.kr";

    pub fn new() -> Self {
        Self::with_base_url(Self::BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            listing: ListingSelectors::parse(
                "#section-list > ul > li",
                ".titles a",
                ".lead a",
                ".thumb",
                ".pagination li a",
            ),
            published: utils::selector("ul.infomation li"),
            body: utils::selector("#article-view-content-div"),
        }
    }
}

impl Default for RookieParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PageParser for RookieParser {
    fn source_metadata(&self) -> SourceMetadata {
        SourceMetadata {
            id: "rookie",
            name: "Rookie",
            emoji: "🏀",
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
        vec!["rookie", "루키"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::InclusionPolicy;
    use crate::test_utils::{rookie_detail, rookie_listing, Item};
    use std::collections::HashSet;

    fn extract(html: &str, query: &str, exclude: &[String]) -> Vec<Candidate> {
        let parser = RookieParser::new();
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut ctx = ExtractContext {
            query,
            exclude,
            policy: InclusionPolicy::TitleOrSummary,
            seen: &mut seen,
        };
        parser.extract_candidates(&document, &mut ctx)
    }

    #[test]
    fn test_can_handle() {
        let parser = RookieParser::new();
        assert!(parser.can_handle("https://www.rookie.co.kr/news/articleView.html?idxno=1"));
        assert!(!parser.can_handle("https://www.jumpball.co.kr/news/articleView.html?idxno=1"));
        assert_eq!(parser.search_url(), "https://www.rookie.co.kr/news/articleList.html");
    }

    #[test]
    fn test_untitled_items_are_skipped() {
        let html = rookie_listing(
            &[
                Item::new("/news/articleView.html?idxno=1", "이현중 20점", ""),
                Item::untitled("/news/articleView.html?idxno=2", "이현중 요약만"),
                Item::new("/news/articleView.html?idxno=3", "이현중 인터뷰", "요약"),
                Item::untitled("/news/articleView.html?idxno=4", "이현중"),
                Item::new("/news/articleView.html?idxno=5", "대표팀 명단", "이현중 포함"),
            ],
            None,
        );
        let candidates = extract(&html, "이현중", &[]);
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.matched));
        assert_eq!(candidates[0].summary, "");
        assert_eq!(
            candidates[0].link,
            "https://www.rookie.co.kr/news/articleView.html?idxno=1"
        );
    }

    #[test]
    fn test_excluded_item_never_extracted() {
        let html = rookie_listing(
            &[
                Item::new("/news/articleView.html?idxno=1", "[주간 랭킹] 이현중", "이현중"),
                Item::new("/news/articleView.html?idxno=2", "이현중 복귀", ""),
            ],
            None,
        );
        let candidates = extract(&html, "이현중", &["[주간 랭킹]".to_string()]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "이현중 복귀");
    }

    #[test]
    fn test_query_match_is_case_insensitive_and_trims() {
        let html = rookie_listing(
            &[
                Item::new("/news/articleView.html?idxno=1", "  LEE Hyun-jung  ", " summary "),
                Item::new("/news/articleView.html?idxno=2", "Other player", "no mention"),
            ],
            None,
        );
        let candidates = extract(&html, "lee", &[]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].title, "LEE Hyun-jung");
        assert_eq!(candidates[0].summary, "summary");
    }

    #[test]
    fn test_thumbnail_from_background_style() {
        let html = rookie_listing(
            &[
                Item::new("/news/articleView.html?idxno=1", "이현중", "")
                    .with_thumb("background-image: url('/news/thumbnail/202401/1_v150.jpg')"),
                Item::new("/news/articleView.html?idxno=2", "이현중 2", ""),
            ],
            None,
        );
        let candidates = extract(&html, "이현중", &[]);
        assert_eq!(
            candidates[0].image_url.as_deref(),
            Some("https://www.rookie.co.kr/news/thumbnail/202401/1_v150.jpg")
        );
        assert_eq!(candidates[1].image_url, None);
    }

    #[test]
    fn test_thumbnail_falls_back_to_img_src() {
        let html = r#"<html><body><section id="section-list"><ul><li>
            <a class="thumb" href="/news/articleView.html?idxno=9"><img src="/news/photo/9.jpg"></a>
            <h4 class="titles"><a href="/news/articleView.html?idxno=9">이현중</a></h4>
        </li></ul></section></body></html>"#;
        let candidates = extract(html, "이현중", &[]);
        assert_eq!(
            candidates[0].image_url.as_deref(),
            Some("https://www.rookie.co.kr/news/photo/9.jpg")
        );
    }

    #[test]
    fn test_total_pages() {
        let parser = RookieParser::new();
        let with_pages = Html::parse_document(&rookie_listing(&[], Some(7)));
        assert_eq!(parser.total_pages(&with_pages), 7);

        let without = Html::parse_document(&rookie_listing(&[], None));
        assert_eq!(parser.total_pages(&without), 1);

        let garbled = Html::parse_document(
            r#"<ul class="pagination"><li><a href="javascript:;">next</a></li></ul>"#,
        );
        assert_eq!(parser.total_pages(&garbled), 1);
    }

    #[test]
    fn test_detail_page_fields() {
        let parser = RookieParser::new();
        let document = Html::parse_document(&rookie_detail(
            Some("입력 2024.01.15 10:30"),
            "이현중이 20점을 넣었다.",
        ));
        assert_eq!(parser.published_text(&document).as_deref(), Some("입력 2024.01.15 10:30"));
        assert!(parser.article_body(&document).unwrap().contains("20점"));

        let missing = Html::parse_document(&rookie_detail(None, "본문"));
        assert_eq!(parser.published_text(&missing), None);
    }
}
