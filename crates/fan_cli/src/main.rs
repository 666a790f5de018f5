use clap::Parser;
use anyhow::Context;
use fan_core::{CrawlConfig, SourceConfig};
use fan_crawler::cli::{handle_command, CrawlArgs, CrawlCommands};
use fan_crawler::logging::init_logging;
use fan_crawler::CrawlManager;
use fan_storage::StorageKind;
use fan_web::AppState;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    /// `<n><unit>` segments with units s, m, h or d; a trailing bare number is seconds.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err("Duration must include a number".to_string());
        }

        let mut rest = compact.as_str();
        let mut total = 0u64;
        while !rest.is_empty() {
            let digits = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            if digits == 0 {
                return Err(format!("Expected a number before {:?}", rest));
            }
            let value: u64 = rest[..digits]
                .parse()
                .map_err(|_| format!("Number too large in {:?}", s))?;
            rest = &rest[digits..];

            let multiplier = match rest.chars().next() {
                None => 1,
                Some('s') => 1,
                Some('m') => 60,
                Some('h') => 3600,
                Some('d') => 86400,
                Some(other) => return Err(format!("Invalid duration unit: {}", other)),
            };
            if !rest.is_empty() {
                rest = &rest[1..];
            }

            total = value
                .checked_mul(multiplier)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(|| format!("Duration too large: {:?}", s))?;
        }

        Ok(HumanDuration(Duration::from_secs(total)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Basketball news crawler for fan communities", long_about = None)]
struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, default_value = "memory")]
    storage: StorageKind,
    /// SQLite database path
    #[arg(long)]
    database: Option<String>,
    /// Re-crawl a source once its last crawl is older than this (e.g. 30d, 12h)
    #[arg(long, default_value = "30d")]
    stale_after: HumanDuration,
    #[arg(long, default_value = "10s")]
    timeout: HumanDuration,
    /// Pause between article detail requests
    #[arg(long, default_value = "1s")]
    detail_delay: HumanDuration,
    #[arg(long, default_value_t = 50)]
    max_pages: u32,
    #[arg(long)]
    user_agent: Option<String>,
    /// Keyword crawled when none is given
    #[arg(long)]
    default_query: Option<String>,
    /// Default exclusion substring (repeatable)
    #[arg(long = "exclude-default")]
    exclude: Vec<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
        /// Start a background crawl for every searched keyword
        #[arg(long)]
        crawl_on_read: bool,
        /// Bearer token required to trigger crawls over HTTP
        #[arg(long)]
        crawl_token: Option<String>,
    },
    /// Crawl a source, once or periodically
    Crawl {
        source: String,
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        exclude: Vec<String>,
        #[arg(long)]
        deep_match: bool,
        #[arg(long)]
        force: bool,
        /// Repeat with this interval (e.g. 1h, 30m, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    /// Search stored articles
    Search { source: String, query: String },
    /// List available sources
    List,
}

impl Cli {
    fn crawl_config(&self) -> CrawlConfig {
        let defaults = CrawlConfig::default();
        CrawlConfig {
            stale_after: self.stale_after.0,
            request_timeout: self.timeout.0,
            detail_delay: self.detail_delay.0,
            max_pages: self.max_pages,
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            ..defaults
        }
    }

    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            default_query: self.default_query.clone().unwrap_or_default(),
            exclude: self.exclude.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = init_logging();
    let cli = Cli::parse();

    let stores = fan_storage::create_storage(cli.storage, cli.database.as_deref())
        .await
        .with_context(|| format!("Failed to open {} storage", cli.storage))?;
    info!("💾 Storage initialized (using {})", cli.storage);

    let manager = CrawlManager::with_default_sources(stores, cli.crawl_config(), cli.source_config())
        .context("Invalid crawl configuration")?;
    let names: Vec<_> = manager.sources().iter().map(|s| s.name).collect();
    info!("🦗 Sources initialized: {}", names.join(", "));

    match cli.command {
        Commands::Serve {
            addr,
            crawl_on_read,
            crawl_token,
        } => {
            let state = AppState::new(Arc::new(manager))
                .with_crawl_on_read(crawl_on_read)
                .with_crawl_token(crawl_token);
            fan_web::serve(state, &addr)
                .await
                .with_context(|| format!("HTTP server on {} stopped", addr))?;
        }
        Commands::Crawl {
            source,
            query,
            exclude,
            deep_match,
            force,
            interval,
        } => {
            let args = CrawlArgs {
                command: CrawlCommands::Crawl {
                    source,
                    query,
                    exclude,
                    deep_match,
                    force,
                },
            };

            if let Some(interval) = interval {
                logger.info(&format!("Running in periodic mode every {}s", interval.0.as_secs()));
                loop {
                    if let Err(e) = handle_command(args.clone(), &manager).await {
                        logger.error(&format!("Crawl cycle failed: {}", e));
                    }
                    info!("Waiting {}s before next crawl", interval.0.as_secs());
                    tokio::time::sleep(interval.0).await;
                }
            } else {
                handle_command(args, &manager).await?;
            }
        }
        Commands::Search { source, query } => {
            let args = CrawlArgs {
                command: CrawlCommands::Search { source, query },
            };
            handle_command(args, &manager).await?;
        }
        Commands::List => {
            let args = CrawlArgs {
                command: CrawlCommands::List,
            };
            handle_command(args, &manager).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: &str) -> u64 {
        s.parse::<HumanDuration>().unwrap().0.as_secs()
    }

    #[test]
    fn test_human_duration() {
        assert_eq!(secs("30d"), 30 * 86400);
        assert_eq!(secs("1h15m30s"), 3600 + 15 * 60 + 30);
        assert_eq!(secs("90"), 90);
        assert_eq!(secs("1h 30"), 3630);
        assert!("".parse::<HumanDuration>().is_err());
        assert!("5w".parse::<HumanDuration>().is_err());
        assert!("h".parse::<HumanDuration>().is_err());
        assert!("1hh".parse::<HumanDuration>().is_err());
        assert!("99999999999999999999d".parse::<HumanDuration>().is_err());
        assert!("999999999999999d".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_flags_build_config() {
        let cli = Cli::parse_from([
            "fan",
            "--stale-after",
            "12h",
            "--detail-delay",
            "0",
            "--max-pages",
            "5",
            "--default-query",
            "이현중",
            "crawl",
            "rookie",
            "--deep-match",
        ]);
        let config = cli.crawl_config();
        assert_eq!(config.stale_after, Duration::from_secs(12 * 3600));
        assert_eq!(config.detail_delay, Duration::ZERO);
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(cli.source_config().default_query, "이현중");
        assert!(matches!(cli.command, Commands::Crawl { deep_match: true, interval: None, .. }));
    }

    #[test]
    fn test_storage_flag() {
        let cli = Cli::parse_from(["fan", "--storage", "sqlite", "--database", "x.db", "list"]);
        assert_eq!(cli.storage, StorageKind::Sqlite);
        assert_eq!(cli.database.as_deref(), Some("x.db"));
        assert!(Cli::try_parse_from(["fan", "--storage", "mongo", "list"]).is_err());
    }
}
