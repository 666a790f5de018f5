use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use fan_core::{
    Article, ArticleStore, Candidate, CheckpointStore, CrawlConfig, Error, Result, SourceConfig,
};
use fan_storage::Stores;
use futures::future::try_join_all;
use scraper::Html;
use serde::Serialize;

use crate::dedup::Deduplicator;
use crate::enricher::DetailEnricher;
use crate::fetcher::{HttpFetcher, PageFetcher};
use crate::logging::Logger;
use crate::scheduler::{Freshness, Scheduler};
use crate::scrapers::{get_parser_factories, ExtractContext, InclusionPolicy, PageParser, SourceMetadata};

/// Parameters of one crawl cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlRequest {
    pub query: String,
    pub exclude: Vec<String>,
    pub deep_match: bool,
    /// Crawl even when the source is fresh
    pub force: bool,
}

impl CrawlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlReport {
    pub source: String,
    pub query: String,
    pub pages_total: u32,
    pub pages_failed: u32,
    pub candidates: usize,
    pub inserted: usize,
    /// Candidates dropped as repeats within the run or already stored
    pub duplicates: usize,
    pub corrected: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlOutcome {
    Completed(CrawlReport),
    /// The source was crawled recently enough
    Skipped { last_crawl: DateTime<Utc> },
    /// Another cycle for the same source is running
    InProgress,
}

/// Removes the source from the in-flight set when the cycle ends, however it ends.
struct InFlightGuard {
    sources: Arc<Mutex<HashSet<String>>>,
    source: String,
}

impl InFlightGuard {
    fn acquire(sources: &Arc<Mutex<HashSet<String>>>, source: &str) -> Option<Self> {
        let mut running = sources.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(source.to_string()) {
            return None;
        }
        Some(Self {
            sources: sources.clone(),
            source: source.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut running = self.sources.lock().unwrap_or_else(|e| e.into_inner());
        running.remove(&self.source);
    }
}

/// Parses a listing page; returns the advertised page count and the candidates on it.
fn parse_listing(
    parser: &dyn PageParser,
    body: &str,
    request: &CrawlRequest,
    policy: InclusionPolicy,
    seen: &mut HashSet<String>,
) -> (u32, Vec<Candidate>) {
    let document = Html::parse_document(body);
    let mut ctx = ExtractContext {
        query: &request.query,
        exclude: &request.exclude,
        policy,
        seen,
    };
    let candidates = parser.extract_candidates(&document, &mut ctx);
    (parser.total_pages(&document), candidates)
}

pub struct CrawlManager {
    articles: Arc<dyn ArticleStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    fetcher: Arc<dyn PageFetcher>,
    parsers: Vec<Arc<dyn PageParser>>,
    sources: HashMap<String, SourceConfig>,
    config: CrawlConfig,
    scheduler: Scheduler,
    enricher: DetailEnricher,
    dedup: Deduplicator,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl CrawlManager {
    pub fn new(stores: Stores, fetcher: Arc<dyn PageFetcher>, config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            scheduler: Scheduler::new(config.stale_after),
            enricher: DetailEnricher::new(fetcher.clone(), config.detail_delay),
            dedup: Deduplicator::new(stores.articles.clone()),
            articles: stores.articles,
            checkpoints: stores.checkpoints,
            fetcher,
            parsers: Vec::new(),
            sources: HashMap::new(),
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// HTTP fetcher plus every built-in source, all sharing `default_source`.
    pub fn with_default_sources(
        stores: Stores,
        config: CrawlConfig,
        default_source: SourceConfig,
    ) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        let mut manager = Self::new(stores, fetcher, config)?;
        for factory in get_parser_factories() {
            manager.add_parser(Arc::from(factory()), default_source.clone());
        }
        Ok(manager)
    }

    pub fn add_parser(&mut self, parser: Arc<dyn PageParser>, source_config: SourceConfig) {
        let id = parser.source_metadata().id.to_string();
        self.parsers.retain(|p| p.source_metadata().id != id);
        self.parsers.push(parser);
        self.sources.insert(id, source_config);
    }

    pub fn sources(&self) -> Vec<SourceMetadata> {
        self.parsers.iter().map(|p| p.source_metadata()).collect()
    }

    /// Resolve a source by id or any of its CLI names.
    pub fn parser(&self, source: &str) -> Result<Arc<dyn PageParser>> {
        let wanted = source.trim().to_lowercase();
        self.parsers
            .iter()
            .find(|p| p.cli_names().iter().any(|name| name.to_lowercase() == wanted))
            .cloned()
            .ok_or_else(|| Error::UnknownSource(source.to_string()))
    }

    /// Build a request from an optional caller query, falling back to the source's default.
    pub fn request_for(&self, source: &str, query: Option<&str>) -> Result<CrawlRequest> {
        let parser = self.parser(source)?;
        let id = parser.source_metadata().id;
        let source_config = self.sources.get(id).cloned().unwrap_or_default();

        let query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .unwrap_or(source_config.default_query);
        if query.trim().is_empty() {
            return Err(Error::Config(format!("No query given and {} has no default query", id)));
        }

        Ok(CrawlRequest {
            query,
            exclude: source_config.exclude,
            ..Default::default()
        })
    }

    fn policy(&self, request: &CrawlRequest) -> InclusionPolicy {
        if request.deep_match {
            InclusionPolicy::DeepMatch {
                min_occurrences: self.config.deep_match_min_occurrences,
            }
        } else {
            InclusionPolicy::TitleOrSummary
        }
    }

    /// Run one crawl cycle for `source`. Only an unreachable first page is an error.
    pub async fn crawl(&self, source: &str, request: &CrawlRequest) -> Result<CrawlOutcome> {
        let parser = self.parser(source)?;
        let meta = parser.source_metadata();
        let id = meta.id;
        let logger = Logger::new().with_prefix(format!("[{}]", id));

        if request.query.trim().is_empty() {
            return Err(Error::Config("Crawl query must not be empty".to_string()));
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, id) else {
            logger.warn("⏳ Crawl already running, not starting another");
            return Ok(CrawlOutcome::InProgress);
        };

        if request.force {
            logger.info("Forced crawl, ignoring checkpoint");
        } else {
            let checkpoint = self.checkpoints.get(id).await?;
            let store_is_empty = self.articles.count(id).await? == 0;
            match self
                .scheduler
                .freshness(checkpoint.as_ref(), store_is_empty, Utc::now())
            {
                Freshness::Fresh { last_crawl } => {
                    logger.info(&format!("✨ Fresh since {}, skipping crawl", last_crawl.to_rfc3339()));
                    return Ok(CrawlOutcome::Skipped { last_crawl });
                }
                Freshness::Stale(reason) => logger.info(&format!("🦗 Crawling, {}", reason)),
            }
        }

        let policy = self.policy(request);
        let search_url = parser.search_url();
        let mut seen = HashSet::new();

        let first = self
            .fetcher
            .fetch_search(&search_url, &request.query, 1)
            .await
            .map_err(|e| {
                logger.error(&format!("❌ First page unreachable, aborting: {}", e));
                e
            })?;
        let (advertised, first_candidates) =
            parse_listing(parser.as_ref(), &first, request, policy, &mut seen);
        let pages_total = advertised.clamp(1, self.config.max_pages);
        if pages_total < advertised {
            logger.warn(&format!("Page count {} capped at {}", advertised, pages_total));
        }
        logger.info(&format!("📄 Page 1/{}: {} candidates", pages_total, first_candidates.len()));

        let mut listed = first_candidates;
        let mut pages_failed = 0;

        for page in 2..=pages_total {
            let body = match self.fetcher.fetch_search(&search_url, &request.query, page).await {
                Ok(body) => body,
                Err(e) => {
                    pages_failed += 1;
                    logger.warn(&format!("⚠️ Page {}/{} failed, skipping: {}", page, pages_total, e));
                    continue;
                }
            };
            let (_, candidates) = parse_listing(parser.as_ref(), &body, request, policy, &mut seen);
            logger.info(&format!("📄 Page {}/{}: {} candidates", page, pages_total, candidates.len()));
            listed.extend(candidates);
        }

        // One pass over the whole cycle so the detail delay also separates pages.
        let mut batch = self
            .enricher
            .enrich_all(parser.as_ref(), listed, &request.query, request.deep_match)
            .await;
        batch.retain(|candidate| policy.accepts(candidate));
        let candidates = batch.len();

        let outcome = self.dedup.partition(id, batch).await;
        if outcome.duplicates > 0 {
            logger.debug(&format!("🔁 {} already known or repeated", outcome.duplicates));
        }
        let duplicates = outcome.duplicates;
        let fresh: Vec<Article> = outcome.fresh.into_iter().map(Article::from).collect();

        let inserted = if fresh.is_empty() {
            0
        } else {
            match self.articles.insert_many(id, &fresh).await {
                Ok(inserted) => inserted,
                Err(e) => {
                    logger.error(&format!("💾 Failed to store {} articles: {}", fresh.len(), e));
                    0
                }
            }
        };

        let mut corrected = 0;
        for article in &outcome.corrections {
            match self.articles.upsert(id, article).await {
                Ok(()) => corrected += 1,
                Err(e) => logger.warn(&format!("Failed to correct {}: {}", article.link, e)),
            }
        }

        let completed_at = Utc::now();
        if let Err(e) = self.checkpoints.upsert(id, completed_at).await {
            logger.error(&format!("Failed to write checkpoint: {}", e));
        }

        logger.info(&format!(
            "✅ Crawl done: {} candidates, {} new, {} duplicates, {} corrected, {}/{} pages failed",
            candidates, inserted, duplicates, corrected, pages_failed, pages_total
        ));

        Ok(CrawlOutcome::Completed(CrawlReport {
            source: id.to_string(),
            query: request.query.clone(),
            pages_total,
            pages_failed,
            candidates,
            inserted,
            duplicates,
            corrected,
            completed_at,
        }))
    }

    /// Stored articles of `source` matching `query`, newest first.
    pub async fn search(&self, source: &str, query: &str) -> Result<Vec<Article>> {
        let parser = self.parser(source)?;
        let articles = self.articles.find_all(parser.source_metadata().id).await?;
        Ok(articles.into_iter().filter(|a| a.matches_query(query)).collect())
    }

    /// The most recent article with a thumbnail across every source.
    pub async fn latest(&self) -> Result<Option<(SourceMetadata, Article)>> {
        let per_source = try_join_all(self.parsers.iter().map(|parser| async move {
            let meta = parser.source_metadata();
            let articles = self.articles.find_all(meta.id).await?;
            Ok::<_, Error>((meta, articles.into_iter().find(|a| a.image_url.is_some())))
        }))
        .await?;

        let mut best: Option<(SourceMetadata, Article)> = None;
        for (meta, newest) in per_source {
            let Some(article) = newest else {
                continue;
            };
            let replace = match &best {
                None => true,
                Some((_, current)) => Article::recency_cmp(&article, current).is_lt(),
            };
            if replace {
                best = Some((meta, article));
            }
        }
        Ok(best)
    }
}
