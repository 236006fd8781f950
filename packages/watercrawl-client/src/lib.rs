//! Pure WaterCrawl REST API client.
//!
//! A minimal client for the WaterCrawl API. Supports listing and creating
//! crawl requests, monitoring a crawl over server-sent events, and paging
//! through its results.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use watercrawl_client::{CrawlEvent, CreateCrawlRequest, WaterCrawlClient};
//!
//! let client = WaterCrawlClient::new("your-api-key");
//!
//! let crawl = client
//!     .create_crawl_request(&CreateCrawlRequest::new("https://example.com"))
//!     .await?;
//!
//! let mut events = client.monitor_crawl_request(&crawl.uuid, true).await?;
//! while let Some(event) = events.next().await {
//!     if let CrawlEvent::Result(page) = event? {
//!         println!("{}", page.url);
//!     }
//! }
//! ```

pub mod error;
pub mod monitor;
pub mod types;

pub use error::{Result, WaterCrawlError};
pub use monitor::MonitorStream;
pub use types::*;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://app.watercrawl.dev";

const CRAWL_REQUESTS_PATH: &str = "/api/v1/core/crawl-requests/";

/// Pure WaterCrawl API client.
#[derive(Clone)]
pub struct WaterCrawlClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl WaterCrawlClient {
    /// Create a new client against the hosted service.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set a custom base URL (self-hosted deployments).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply a per-request timeout. Also bounds how long a monitoring
    /// stream may stay open.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WaterCrawlError::Config(e.to_string()))?;
        Ok(self)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, CRAWL_REQUESTS_PATH, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("X-API-Key", &self.api_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "WaterCrawl request failed");
                WaterCrawlError::from_request(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %message, "WaterCrawl API error");
            return Err(WaterCrawlError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self
            .send(builder.header(reqwest::header::ACCEPT, "application/json"))
            .await?;
        let body = response
            .bytes()
            .await
            .map_err(WaterCrawlError::from_stream)?;
        serde_json::from_slice(&body).map_err(|e| WaterCrawlError::Parse(e.to_string()))
    }

    /// List crawl requests, newest first.
    pub async fn get_crawl_requests_list(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<CrawlRequest>> {
        let builder = self
            .http_client
            .get(self.url(""))
            .query(&[("page", page), ("page_size", page_size)]);
        self.send_json(builder).await
    }

    /// Submit a new crawl. Returns immediately with the stored request.
    pub async fn create_crawl_request(&self, request: &CreateCrawlRequest) -> Result<CrawlRequest> {
        let builder = self.http_client.post(self.url("")).json(request);
        let crawl: CrawlRequest = self.send_json(builder).await?;
        debug!(crawl_id = %crawl.uuid, url = %request.url, "Crawl request created");
        Ok(crawl)
    }

    pub async fn get_crawl_request(&self, uuid: &str) -> Result<CrawlRequest> {
        let builder = self.http_client.get(self.url(&format!("{}/", uuid)));
        self.send_json(builder).await
    }

    /// Ask the service to stop a running crawl.
    pub async fn stop_crawl_request(&self, uuid: &str) -> Result<()> {
        let builder = self.http_client.delete(self.url(&format!("{}/", uuid)));
        self.send(builder).await?;
        Ok(())
    }

    /// Subscribe to a crawl's event stream.
    ///
    /// The stream starts from the beginning on every call; there is no resume
    /// cursor. With `prefetched`, result events carry page content inline.
    pub async fn monitor_crawl_request(&self, uuid: &str, prefetched: bool) -> Result<MonitorStream> {
        let builder = self
            .http_client
            .get(self.url(&format!("{}/status/", uuid)))
            .query(&[("prefetched", prefetched)])
            .header(reqwest::header::ACCEPT, "text/event-stream");

        let response = self.send(builder).await?;
        debug!(crawl_id = uuid, "Monitoring stream opened");
        Ok(MonitorStream::new(response.bytes_stream()))
    }

    /// Fetch one page of a crawl's stored results. Pages start at 1.
    pub async fn get_crawl_request_results(
        &self,
        uuid: &str,
        page: u32,
        page_size: u32,
        prefetched: bool,
    ) -> Result<Paginated<CrawlResultRecord>> {
        let builder = self
            .http_client
            .get(self.url(&format!("{}/results/", uuid)))
            .query(&[
                ("page", page.to_string()),
                ("page_size", page_size.to_string()),
                ("prefetched", prefetched.to_string()),
            ]);
        self.send_json(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = WaterCrawlClient::new("wc-test").with_base_url("https://crawl.local/");

        assert_eq!(client.api_key(), "wc-test");
        assert_eq!(client.base_url(), "https://crawl.local");
        assert_eq!(
            client.url("abc/status/"),
            "https://crawl.local/api/v1/core/crawl-requests/abc/status/"
        );
    }

    #[test]
    fn test_default_base_url() {
        let client = WaterCrawlClient::new("wc-test");
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }
}
