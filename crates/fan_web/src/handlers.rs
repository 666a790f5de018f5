use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use fan_core::{Article, Error};
use fan_crawler::{CrawlOutcome, CrawlRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Missing or invalid crawl token")]
    Unauthorized,
    #[error("{0}")]
    Internal(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::UnknownSource(source) => ApiError::NotFound(format!("Unknown source: {}", source)),
            Error::Config(message) => ApiError::BadRequest(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub image_url: Option<String>,
    pub created_at: Option<String>,
    pub keyword_count: u32,
}

impl From<Article> for ArticleResponse {
    fn from(article: Article) -> Self {
        Self {
            id: article.id,
            title: article.title,
            link: article.link,
            summary: article.summary,
            image_url: article.image_url,
            created_at: article
                .created_at
                .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            keyword_count: article.keyword_count.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Cached articles of a source matching `q`, newest first.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ArticleResponse>>, ApiError> {
    state.manager.parser(&source)?;
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::BadRequest("Query parameter `q` is required".to_string()));
    }

    if state.crawl_on_read {
        let request = state.manager.request_for(&source, Some(query))?;
        let manager = state.manager.clone();
        let source = source.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.crawl(&source, &request).await {
                tracing::warn!("Background crawl of {} failed: {}", source, e);
            }
        });
    }

    let articles = state.manager.search(&source, query).await?;
    Ok(Json(articles.into_iter().map(ArticleResponse::from).collect()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CrawlBody {
    pub query: Option<String>,
    pub exclude: Option<Vec<String>>,
    pub deep_match: bool,
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CrawlResponse {
    Completed {
        new_articles: usize,
        duplicates: usize,
        corrected: usize,
        candidates: usize,
        pages_total: u32,
        pages_failed: u32,
        completed_at: DateTime<Utc>,
    },
    Skipped {
        message: String,
        last_crawl: DateTime<Utc>,
    },
    InProgress {
        message: String,
    },
    Error {
        message: String,
    },
}

fn crawl_request(state: &AppState, source: &str, body: CrawlBody) -> Result<CrawlRequest, ApiError> {
    let mut request = state.manager.request_for(source, body.query.as_deref())?;
    if let Some(exclude) = body.exclude {
        request.exclude = exclude;
    }
    request.deep_match = body.deep_match;
    request.force = body.force;
    Ok(request)
}

/// Trigger a crawl. The body is optional; an empty one crawls the source's default query.
pub async fn crawl(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let auth = headers.get(header::AUTHORIZATION).and_then(|h| h.to_str().ok());
    if !state.authorizes(auth) {
        return Err(ApiError::Unauthorized);
    }

    let body: CrawlBody = if body.iter().all(u8::is_ascii_whitespace) {
        CrawlBody::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("Invalid body: {}", e)))?
    };
    let request = crawl_request(&state, &source, body)?;

    let response = match state.manager.crawl(&source, &request).await {
        Ok(CrawlOutcome::Completed(report)) => (
            StatusCode::OK,
            CrawlResponse::Completed {
                new_articles: report.inserted,
                duplicates: report.duplicates,
                corrected: report.corrected,
                candidates: report.candidates,
                pages_total: report.pages_total,
                pages_failed: report.pages_failed,
                completed_at: report.completed_at,
            },
        ),
        Ok(CrawlOutcome::Skipped { last_crawl }) => (
            StatusCode::OK,
            CrawlResponse::Skipped {
                message: format!("{} was crawled recently", source),
                last_crawl,
            },
        ),
        Ok(CrawlOutcome::InProgress) => (
            StatusCode::OK,
            CrawlResponse::InProgress {
                message: format!("A crawl of {} is already running", source),
            },
        ),
        Err(e) => {
            tracing::error!("Crawl of {} failed: {}", source, e);
            let status = if e.is_transport() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                CrawlResponse::Error {
                    message: e.to_string(),
                },
            )
        }
    };
    Ok((response.0, Json(response.1)).into_response())
}

/// Newest article with an image across all sources.
pub async fn latest(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    match state.manager.latest().await? {
        Some((_, article)) => Ok(Json(json!({ "main_article": ArticleResponse::from(article) }))),
        None => Err(ApiError::NotFound("No articles yet".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_app;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::TimeZone;
    use fan_core::{ArticleStore, Candidate, CheckpointStore, CrawlConfig, SourceConfig};
    use fan_crawler::scrapers::korea::RookieParser;
    use fan_crawler::{CrawlManager, HttpFetcher};
    use fan_storage::{MemoryStorage, Stores};
    use mockito::{Matcher, Server};
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    const LISTING: &str = r#"<html><body><section id="section-list"><ul>
        <li><h4 class="titles"><a href="/news/articleView.html?idxno=1">Lee Hyun-jung signs</a></h4>
            <p class="lead"><a href="/news/articleView.html?idxno=1">NBL deal</a></p></li>
        </ul></section></body></html>"#;

    fn manager(base_url: &str, storage: &MemoryStorage) -> CrawlManager {
        let config = CrawlConfig {
            detail_delay: Duration::ZERO,
            ..Default::default()
        };
        let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
        let mut manager =
            CrawlManager::new(Stores::from_backend(storage.clone()), fetcher, config).unwrap();
        manager.add_parser(
            Arc::new(RookieParser::with_base_url(base_url)),
            SourceConfig {
                default_query: "lee".to_string(),
                exclude: vec![],
            },
        );
        manager
    }

    fn app(state: AppState) -> axum::Router {
        create_app(state)
    }

    async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn seeded_storage() -> MemoryStorage {
        let storage = MemoryStorage::new();
        let mut dated = Article::from(Candidate {
            title: "Lee Hyun-jung interview".to_string(),
            link: "https://www.rookie.co.kr/news/articleView.html?idxno=1".to_string(),
            image_url: Some("https://www.rookie.co.kr/1.jpg".to_string()),
            ..Default::default()
        });
        dated.created_at = Some(Utc.with_ymd_and_hms(2024, 1, 15, 1, 30, 0).unwrap());
        dated.keyword_count = Some(4);
        let undated = Article::from(Candidate {
            title: "Another Lee story".to_string(),
            link: "https://www.rookie.co.kr/news/articleView.html?idxno=2".to_string(),
            ..Default::default()
        });
        let unrelated = Article::from(Candidate {
            title: "KBL standings".to_string(),
            link: "https://www.rookie.co.kr/news/articleView.html?idxno=3".to_string(),
            ..Default::default()
        });
        storage
            .insert_many("rookie", &[undated, dated, unrelated])
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn test_search_returns_matching_articles_newest_first() {
        let storage = seeded_storage().await;
        let state = AppState::new(Arc::new(manager("https://www.rookie.co.kr", &storage)));

        let (status, body) = send(app(state), get("/api/rookie/search?q=LEE")).await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["title"], "Lee Hyun-jung interview");
        assert_eq!(items[0]["created_at"], "2024-01-15T01:30:00Z");
        assert_eq!(items[0]["keyword_count"], 4);
        assert!(items[0]["_id"].is_string());
        assert_eq!(items[1]["created_at"], Value::Null);
        assert_eq!(items[1]["image_url"], Value::Null);
        assert_eq!(items[1]["keyword_count"], 0);
    }

    #[tokio::test]
    async fn test_search_validates_input() {
        let storage = MemoryStorage::new();
        let state = AppState::new(Arc::new(manager("https://www.rookie.co.kr", &storage)));
        let app = app(state);

        let (status, body) = send(app.clone(), get("/api/rookie/search")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = send(app.clone(), get("/api/rookie/search?q=%20")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(app, get("/api/kbl/search?q=lee")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_crawl_then_skip() {
        let mut server = Server::new_async().await;
        let _listing = server
            .mock("GET", "/news/articleList.html")
            .match_query(Matcher::UrlEncoded("sc_word".into(), "lee".into()))
            .with_body(LISTING)
            .create_async()
            .await;
        let _detail = server
            .mock("GET", "/news/articleView.html")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let storage = MemoryStorage::new();
        let state = AppState::new(Arc::new(manager(&server.url(), &storage)));
        let app = app(state);

        let (status, body) = send(app.clone(), post("/api/rookie/crawl", "")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["new_articles"], 1);

        let (status, body) = send(app.clone(), post("/api/rookie/crawl", "{}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "skipped");
        assert!(body["last_crawl"].is_string());

        let (_, body) = send(app, post("/api/rookie/crawl", r#"{"force": true}"#)).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["new_articles"], 0);
        assert_eq!(body["duplicates"], 1);
        assert_eq!(storage.count("rookie").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_crawl_upstream_failure_is_bad_gateway() {
        let mut server = Server::new_async().await;
        let _down = server
            .mock("GET", "/news/articleList.html")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let storage = MemoryStorage::new();
        let state = AppState::new(Arc::new(manager(&server.url(), &storage)));

        let (status, body) = send(app(state), post("/api/rookie/crawl", "")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "error");
        assert!(body["message"].is_string());
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl ArticleStore for BrokenStore {
        async fn find_by_link(&self, _source: &str, _link: &str) -> fan_core::Result<Option<Article>> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn insert_many(&self, _source: &str, _articles: &[Article]) -> fan_core::Result<usize> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn upsert(&self, _source: &str, _article: &Article) -> fan_core::Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn find_all(&self, _source: &str) -> fan_core::Result<Vec<Article>> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn count(&self, _source: &str) -> fan_core::Result<usize> {
            Err(Error::Storage("disk full".to_string()))
        }
    }

    #[async_trait::async_trait]
    impl CheckpointStore for BrokenStore {
        async fn get(&self, _name: &str) -> fan_core::Result<Option<fan_core::Checkpoint>> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn upsert(&self, _name: &str, _date: DateTime<Utc>) -> fan_core::Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_crawl_storage_failure_is_internal_error() {
        let config = CrawlConfig::default();
        let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
        let mut manager = CrawlManager::new(Stores::from_backend(BrokenStore), fetcher, config).unwrap();
        manager.add_parser(
            Arc::new(RookieParser::new()),
            SourceConfig {
                default_query: "lee".to_string(),
                exclude: vec![],
            },
        );

        let (status, body) = send(app(AppState::new(Arc::new(manager))), post("/api/rookie/crawl", "")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_crawl_token_gate() {
        let storage = MemoryStorage::new();
        let state = AppState::new(Arc::new(manager("https://www.rookie.co.kr", &storage)))
            .with_crawl_token(Some("secret".to_string()));
        let app = app(state);

        let (status, _) = send(app.clone(), post("/api/rookie/crawl", "")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("POST")
            .uri("/api/rookie/crawl")
            .header("authorization", "secret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .method("POST")
            .uri("/api/kbl/crawl")
            .header("authorization", "Bearer secret")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_crawl_rejects_malformed_body() {
        let storage = MemoryStorage::new();
        let state = AppState::new(Arc::new(manager("https://www.rookie.co.kr", &storage)));
        let (status, _) = send(app(state), post("/api/rookie/crawl", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_latest() {
        let storage = MemoryStorage::new();
        let state = AppState::new(Arc::new(manager("https://www.rookie.co.kr", &storage)));
        let (status, _) = send(app(state), get("/api/latest")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let storage = seeded_storage().await;
        let state = AppState::new(Arc::new(manager("https://www.rookie.co.kr", &storage)));
        let (status, body) = send(app(state), get("/api/latest")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["main_article"]["title"], "Lee Hyun-jung interview");
        assert_eq!(body["main_article"]["image_url"], "https://www.rookie.co.kr/1.jpg");
    }
}
