use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Article, Checkpoint};
use crate::Result;

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Look up a stored article of `source` by its link
    async fn find_by_link(&self, source: &str, link: &str) -> Result<Option<Article>>;

    /// Insert articles whose link is not stored yet. Returns how many were written;
    /// a single failing record is skipped, not fatal.
    async fn insert_many(&self, source: &str, articles: &[Article]) -> Result<usize>;

    /// Insert or replace the article with the same link
    async fn upsert(&self, source: &str, article: &Article) -> Result<()>;

    /// All articles of `source`, newest first, undated last
    async fn find_all(&self, source: &str) -> Result<Vec<Article>>;

    async fn count(&self, source: &str) -> Result<usize>;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<Checkpoint>>;

    async fn upsert(&self, name: &str, date: DateTime<Utc>) -> Result<()>;
}
