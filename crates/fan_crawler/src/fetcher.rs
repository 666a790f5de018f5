use async_trait::async_trait;
use fan_core::{CrawlConfig, Error, Result};
use reqwest::{Client, RequestBuilder};
use url::Url;

/// Outbound HTTP for listing and detail pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET an arbitrary page, typically an article's detail view
    async fn fetch(&self, url: &str) -> Result<String>;

    /// GET one page of search results for `query`
    async fn fetch_search(&self, search_url: &str, query: &str, page: u32) -> Result<String>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let url = Url::parse(url)?;
        self.send(self.client.get(url)).await
    }

    async fn fetch_search(&self, search_url: &str, query: &str, page: u32) -> Result<String> {
        let request = self.client.get(Url::parse(search_url)?).query(&[
            ("sc_word", query.to_string()),
            ("view_type", "sm".to_string()),
            ("page", page.to_string()),
        ]);
        self.send(request).await
    }
}
