use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use fan_core::{Article, ArticleStore, Checkpoint, CheckpointStore, Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        source TEXT NOT NULL,
        link TEXT NOT NULL,
        id TEXT NOT NULL,
        title TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        image_url TEXT,
        created_at TEXT,
        keyword_count INTEGER,
        PRIMARY KEY (source, link)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS checkpoints (
        name TEXT PRIMARY KEY,
        date TEXT NOT NULL
    )
    "#,
];

pub const DEFAULT_DB_PATH: &str = "fan_news.db";

fn storage_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Storage(format!("{}: {}", context, e))
}

// Fixed-width UTC text so lexical order matches chronological order.
fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Failed to parse stored date {}: {}", raw, e)))
}

fn row_to_article(row: &SqliteRow) -> Result<Article> {
    let created_at = row
        .try_get::<Option<String>, _>("created_at")
        .map_err(storage_error("Failed to read created_at"))?
        .map(|raw| parse_date(&raw))
        .transpose()?;
    let keyword_count = row
        .try_get::<Option<i64>, _>("keyword_count")
        .map_err(storage_error("Failed to read keyword_count"))?
        .and_then(|count| u32::try_from(count).ok());

    Ok(Article {
        id: row.try_get("id").map_err(storage_error("Failed to read id"))?,
        link: row.try_get("link").map_err(storage_error("Failed to read link"))?,
        title: row.try_get("title").map_err(storage_error("Failed to read title"))?,
        summary: row.try_get("summary").map_err(storage_error("Failed to read summary"))?,
        image_url: row
            .try_get("image_url")
            .map_err(storage_error("Failed to read image_url"))?,
        created_at,
        keyword_count,
    })
}

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SQLiteStorage {
    pub async fn new() -> Result<Self> {
        Self::new_with_path(Path::new(DEFAULT_DB_PATH)).await
    }

    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(storage_error("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    async fn insert_one(&self, source: &str, article: &Article) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO articles
            (source, link, id, title, summary, image_url, created_at, keyword_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(source)
        .bind(&article.link)
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(article.image_url.as_deref())
        .bind(article.created_at.as_ref().map(format_date))
        .bind(article.keyword_count.map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to insert article"))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ArticleStore for SQLiteStorage {
    async fn find_by_link(&self, source: &str, link: &str) -> Result<Option<Article>> {
        let row = sqlx::query("SELECT * FROM articles WHERE source = ? AND link = ?")
            .bind(source)
            .bind(link)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("Failed to look up article"))?;

        row.as_ref().map(row_to_article).transpose()
    }

    async fn insert_many(&self, source: &str, articles: &[Article]) -> Result<usize> {
        let mut inserted = 0;
        for article in articles {
            match self.insert_one(source, article).await {
                Ok(true) => inserted += 1,
                Ok(false) => tracing::debug!("Skipping stored link {}", article.link),
                Err(e) => tracing::warn!("Dropping {} from batch: {}", article.link, e),
            }
        }
        Ok(inserted)
    }

    async fn upsert(&self, source: &str, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles
            (source, link, id, title, summary, image_url, created_at, keyword_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source, link) DO UPDATE SET
                title = excluded.title,
                summary = excluded.summary,
                image_url = excluded.image_url,
                created_at = excluded.created_at,
                keyword_count = excluded.keyword_count
            "#,
        )
        .bind(source)
        .bind(&article.link)
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(article.image_url.as_deref())
        .bind(article.created_at.as_ref().map(format_date))
        .bind(article.keyword_count.map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to upsert article"))?;

        Ok(())
    }

    async fn find_all(&self, source: &str) -> Result<Vec<Article>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE source = ?
            ORDER BY created_at IS NULL, created_at DESC
            "#,
        )
        .bind(source)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("Failed to get articles by source"))?;

        rows.iter().map(row_to_article).collect()
    }

    async fn count(&self, source: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE source = ?")
            .bind(source)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("Failed to count articles"))?;

        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl CheckpointStore for SQLiteStorage {
    async fn get(&self, name: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query("SELECT name, date FROM checkpoints WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("Failed to read checkpoint"))?;

        match row {
            Some(row) => {
                let raw: String = row.try_get("date").map_err(storage_error("Failed to read date"))?;
                Ok(Some(Checkpoint {
                    name: row.try_get("name").map_err(storage_error("Failed to read name"))?,
                    date: parse_date(&raw)?,
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, name: &str, date: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (name, date) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET date = excluded.date
            "#,
        )
        .bind(name)
        .bind(format_date(&date))
        .execute(&self.pool)
        .await
        .map_err(storage_error("Failed to write checkpoint"))?;

        Ok(())
    }
}
