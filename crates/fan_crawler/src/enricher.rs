use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use fan_core::Candidate;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;

use crate::fetcher::PageFetcher;
use crate::scrapers::PageParser;

lazy_static! {
    static ref TIMESTAMP: Regex =
        Regex::new(r"(\d{4})[-./](\d{1,2})[-./](\d{1,2})\s+(\d{1,2}):(\d{2})(?::(\d{2}))?").unwrap();
}

/// Pull `YYYY-MM-DD HH:MM[:SS]` (also `.` or `/` separated) out of free text and
/// interpret it at the given UTC offset.
pub fn parse_published_at(text: &str, offset_secs: i32) -> Option<DateTime<Utc>> {
    let caps = TIMESTAMP.captures(text)?;
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, number(2)?, number(3)?)?;
    let naive = date.and_hms_opt(number(4)?, number(5)?, number(6).unwrap_or(0))?;

    let offset = FixedOffset::east_opt(offset_secs)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Non-overlapping, case-insensitive occurrences of `needle`.
pub fn count_occurrences(haystack: &str, needle: &str) -> u32 {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return 0;
    }
    let count = haystack.to_lowercase().matches(needle.as_str()).count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

#[derive(Debug, Default, PartialEq)]
struct DetailFields {
    created_at: Option<DateTime<Utc>>,
    keyword_count: Option<u32>,
}

fn read_detail(parser: &dyn PageParser, body: &str, query: &str, deep_match: bool) -> DetailFields {
    let document = Html::parse_document(body);
    let created_at = parser
        .published_text(&document)
        .and_then(|text| parse_published_at(&text, parser.utc_offset_secs()));
    let keyword_count = if deep_match {
        Some(
            parser
                .article_body(&document)
                .map(|text| count_occurrences(&text, query))
                .unwrap_or(0),
        )
    } else {
        None
    };
    DetailFields {
        created_at,
        keyword_count,
    }
}

/// Fills `created_at` (and `keyword_count` under deep match) from each
/// candidate's detail page on the source's own host. Never drops a candidate.
pub struct DetailEnricher {
    fetcher: Arc<dyn PageFetcher>,
    delay: Duration,
}

impl DetailEnricher {
    pub fn new(fetcher: Arc<dyn PageFetcher>, delay: Duration) -> Self {
        Self { fetcher, delay }
    }

    pub async fn enrich(
        &self,
        parser: &dyn PageParser,
        candidate: &mut Candidate,
        query: &str,
        deep_match: bool,
    ) {
        if !parser.can_handle(&candidate.link) {
            tracing::debug!("Not fetching off-site detail page {}", candidate.link);
            return;
        }
        let body = match self.fetcher.fetch(&candidate.link).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!("⚠️ Detail page unavailable for {}: {}", candidate.link, e);
                return;
            }
        };

        let fields = read_detail(parser, &body, query, deep_match);
        if fields.created_at.is_none() {
            tracing::debug!("No publish time found on {}", candidate.link);
        }
        candidate.created_at = fields.created_at;
        candidate.keyword_count = fields.keyword_count;
    }

    /// Enrich in order, pausing between detail requests.
    pub async fn enrich_all(
        &self,
        parser: &dyn PageParser,
        mut candidates: Vec<Candidate>,
        query: &str,
        deep_match: bool,
    ) -> Vec<Candidate> {
        for (i, candidate) in candidates.iter_mut().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.enrich(parser, candidate, query, deep_match).await;
        }
        candidates
    }
}
