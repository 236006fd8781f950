use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use watercrawl_client::{
    CrawlEvent, CrawlRequest, CrawlResultRecord, CreateCrawlRequest, Paginated, Result,
    WaterCrawlClient,
};

/// Events from one subscription to a crawl's monitoring endpoint.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<CrawlEvent>> + Send>>;

/// The slice of the WaterCrawl API the datasource uses (to allow mocking).
#[async_trait]
pub trait CrawlApi: Send + Sync {
    async fn list_crawl_requests(&self, page_size: u32) -> Result<Paginated<CrawlRequest>>;

    async fn create_crawl_request(&self, request: &CreateCrawlRequest) -> Result<CrawlRequest>;

    /// Subscribe from the start of the crawl's event history.
    async fn monitor_crawl_request(&self, crawl_id: &str, prefetched: bool) -> Result<EventStream>;

    async fn get_crawl_request_results(
        &self,
        crawl_id: &str,
        page: u32,
        page_size: u32,
        prefetched: bool,
    ) -> Result<Paginated<CrawlResultRecord>>;
}

#[async_trait]
impl CrawlApi for WaterCrawlClient {
    async fn list_crawl_requests(&self, page_size: u32) -> Result<Paginated<CrawlRequest>> {
        self.get_crawl_requests_list(1, page_size).await
    }

    async fn create_crawl_request(&self, request: &CreateCrawlRequest) -> Result<CrawlRequest> {
        WaterCrawlClient::create_crawl_request(self, request).await
    }

    async fn monitor_crawl_request(&self, crawl_id: &str, prefetched: bool) -> Result<EventStream> {
        let stream = WaterCrawlClient::monitor_crawl_request(self, crawl_id, prefetched).await?;
        Ok(Box::pin(stream))
    }

    async fn get_crawl_request_results(
        &self,
        crawl_id: &str,
        page: u32,
        page_size: u32,
        prefetched: bool,
    ) -> Result<Paginated<CrawlResultRecord>> {
        WaterCrawlClient::get_crawl_request_results(self, crawl_id, page, page_size, prefetched)
            .await
    }
}
