use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A harvested news item. `link` is the natural key within a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(rename = "_id")]
    pub id: String,
    pub link: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Publish time recovered from the detail page.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub keyword_count: Option<u32>,
}

impl Article {
    /// Newest first, articles without a publish time last.
    pub fn recency_cmp(a: &Article, b: &Article) -> Ordering {
        match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    pub fn sort_by_recency(articles: &mut [Article]) {
        articles.sort_by(Article::recency_cmp);
    }

    /// Case-insensitive match on title or summary. A blank query matches everything.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query) || self.summary.to_lowercase().contains(&query)
    }
}

/// An item extracted from a listing page, before dedup and persistence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub image_url: Option<String>,
    /// Whether the query occurred in the title or summary.
    pub matched: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub keyword_count: Option<u32>,
}

impl From<Candidate> for Article {
    fn from(candidate: Candidate) -> Self {
        Article {
            id: Uuid::new_v4().to_string(),
            link: candidate.link,
            title: candidate.title,
            summary: candidate.summary,
            image_url: candidate.image_url,
            created_at: candidate.created_at,
            keyword_count: candidate.keyword_count,
        }
    }
}

/// Last completed crawl of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub name: String,
    pub date: DateTime<Utc>,
}
