use clap::{Args, Subcommand};
use fan_core::{Article, Result};

use crate::manager::{CrawlManager, CrawlOutcome, CrawlRequest};
use crate::scrapers::SourceMetadata;

#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    #[command(subcommand)]
    pub command: CrawlCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CrawlCommands {
    /// Crawl a source for articles matching a query
    Crawl {
        /// Source id or alias (e.g. rookie, jumpball)
        source: String,
        /// Search keyword, defaults to the configured query
        #[arg(long)]
        query: Option<String>,
        /// Drop items whose title or summary contains this text (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Also keep items whose article body mentions the query
        #[arg(long)]
        deep_match: bool,
        /// Crawl even if the last crawl is recent
        #[arg(long)]
        force: bool,
    },
    /// Search stored articles of a source
    Search { source: String, query: String },
    /// List available sources
    List,
}

pub fn format_article(article: &Article) -> String {
    let date = article
        .created_at
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "----------------".to_string());
    format!("{} {} - {}", date, article.title, article.link)
}

pub fn format_source(meta: &SourceMetadata) -> String {
    format!(
        "{} {} - {} [{} {}]",
        meta.emoji, meta.id, meta.name, meta.region.emoji, meta.region.name
    )
}

fn build_request(
    manager: &CrawlManager,
    source: &str,
    query: Option<&str>,
    exclude: Vec<String>,
    deep_match: bool,
    force: bool,
) -> Result<CrawlRequest> {
    let mut request = manager.request_for(source, query)?;
    if !exclude.is_empty() {
        request.exclude = exclude;
    }
    request.deep_match = deep_match;
    request.force = force;
    Ok(request)
}

pub async fn handle_command(args: CrawlArgs, manager: &CrawlManager) -> Result<()> {
    match args.command {
        CrawlCommands::Crawl {
            source,
            query,
            exclude,
            deep_match,
            force,
        } => {
            let request = build_request(manager, &source, query.as_deref(), exclude, deep_match, force)?;
            match manager.crawl(&source, &request).await? {
                CrawlOutcome::Completed(report) => {
                    println!(
                        "🆕 {} new, 📝 {} corrected, 🔁 {} duplicates from {} candidates ({} of {} pages failed)",
                        report.inserted,
                        report.corrected,
                        report.duplicates,
                        report.candidates,
                        report.pages_failed,
                        report.pages_total
                    );
                }
                CrawlOutcome::Skipped { last_crawl } => {
                    println!(
                        "⏭️ {} is fresh (last crawl {}), use --force to crawl anyway",
                        source,
                        last_crawl.to_rfc3339()
                    );
                }
                CrawlOutcome::InProgress => println!("⏳ A crawl of {} is already running", source),
            }
        }
        CrawlCommands::Search { source, query } => {
            let articles = manager.search(&source, &query).await?;
            println!("Found {} articles", articles.len());
            for article in &articles {
                println!("{}", format_article(article));
            }
        }
        CrawlCommands::List => {
            println!("Available sources:");
            for meta in manager.sources() {
                println!("  {}", format_source(&meta));
            }
        }
    }
    Ok(())
}
