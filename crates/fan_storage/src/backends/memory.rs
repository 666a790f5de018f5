use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fan_core::{Article, ArticleStore, Checkpoint, CheckpointStore, Result};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    articles: HashMap<String, Vec<Article>>,
    checkpoints: HashMap<String, Checkpoint>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, source: &str) -> &[Article] {
        self.articles.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_by_link(&self, source: &str, link: &str) -> Option<Article> {
        self.collection(source).iter().find(|a| a.link == link).cloned()
    }

    pub fn insert_many(&mut self, source: &str, articles: &[Article]) -> usize {
        let collection = self.articles.entry(source.to_string()).or_default();
        let mut inserted = 0;
        for article in articles {
            if collection.iter().any(|a| a.link == article.link) {
                continue;
            }
            collection.push(article.clone());
            inserted += 1;
        }
        inserted
    }

    pub fn upsert(&mut self, source: &str, article: &Article) {
        let collection = self.articles.entry(source.to_string()).or_default();
        if let Some(existing) = collection.iter_mut().find(|a| a.link == article.link) {
            let id = std::mem::take(&mut existing.id);
            *existing = Article { id, ..article.clone() };
        } else {
            collection.push(article.clone());
        }
    }

    pub fn find_all(&self, source: &str) -> Vec<Article> {
        let mut articles = self.collection(source).to_vec();
        Article::sort_by_recency(&mut articles);
        articles
    }

    pub fn count(&self, source: &str) -> usize {
        self.collection(source).len()
    }

    pub fn checkpoint(&self, name: &str) -> Option<Checkpoint> {
        self.checkpoints.get(name).cloned()
    }

    pub fn set_checkpoint(&mut self, name: &str, date: DateTime<Utc>) {
        self.checkpoints.insert(
            name.to_string(),
            Checkpoint {
                name: name.to_string(),
                date,
            },
        );
    }
}

/// Process-local storage. Clones share the same underlying collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryStorage {
    async fn find_by_link(&self, source: &str, link: &str) -> Result<Option<Article>> {
        Ok(self.store.read().await.find_by_link(source, link))
    }

    async fn insert_many(&self, source: &str, articles: &[Article]) -> Result<usize> {
        Ok(self.store.write().await.insert_many(source, articles))
    }

    async fn upsert(&self, source: &str, article: &Article) -> Result<()> {
        self.store.write().await.upsert(source, article);
        Ok(())
    }

    async fn find_all(&self, source: &str) -> Result<Vec<Article>> {
        Ok(self.store.read().await.find_all(source))
    }

    async fn count(&self, source: &str) -> Result<usize> {
        Ok(self.store.read().await.count(source))
    }
}

#[async_trait]
impl CheckpointStore for MemoryStorage {
    async fn get(&self, name: &str) -> Result<Option<Checkpoint>> {
        Ok(self.store.read().await.checkpoint(name))
    }

    async fn upsert(&self, name: &str, date: DateTime<Utc>) -> Result<()> {
        self.store.write().await.set_checkpoint(name, date);
        Ok(())
    }
}
