//! Link-keyed deduplication of a crawl batch against the article store.

use std::collections::HashSet;
use std::sync::Arc;

use fan_core::{Article, ArticleStore, Candidate};

#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Candidates whose link is not stored yet, in first-seen order
    pub fresh: Vec<Candidate>,
    /// Stored articles that gain a publish time this run
    pub corrections: Vec<Article>,
    /// Candidates dropped as repeats within the batch or of stored links
    pub duplicates: usize,
}

pub struct Deduplicator {
    store: Arc<dyn ArticleStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    pub async fn partition(&self, source: &str, candidates: Vec<Candidate>) -> DedupOutcome {
        let mut outcome = DedupOutcome::default();
        let mut batch_links = HashSet::new();

        for candidate in candidates {
            if !batch_links.insert(candidate.link.clone()) {
                outcome.duplicates += 1;
                continue;
            }

            match self.store.find_by_link(source, &candidate.link).await {
                Ok(None) => outcome.fresh.push(candidate),
                Ok(Some(existing)) => {
                    outcome.duplicates += 1;
                    if let Some(corrected) = correction(existing, candidate) {
                        outcome.corrections.push(corrected);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping {} this run, lookup failed: {}", candidate.link, e);
                }
            }
        }

        outcome
    }
}

/// A stored article missing its publish time takes it from a newer sighting.
fn correction(existing: Article, candidate: Candidate) -> Option<Article> {
    if existing.created_at.is_some() || candidate.created_at.is_none() {
        return None;
    }
    Some(Article {
        created_at: candidate.created_at,
        keyword_count: candidate.keyword_count.or(existing.keyword_count),
        image_url: existing.image_url.or(candidate.image_url),
        ..existing
    })
}
