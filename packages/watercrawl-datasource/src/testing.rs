//! Testing utilities including a mock WaterCrawl API.
//!
//! Useful for exercising the crawl loop without making real network calls.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use watercrawl_client::{
    CrawlEvent, CrawlOptions, CrawlRequest, CrawlResultRecord, CrawlState, CrawlStatus,
    CreateCrawlRequest, Paginated, Result, WaterCrawlError,
};

use crate::traits::{CrawlApi, EventStream};

/// One scripted subscription to the monitoring endpoint.
pub enum Subscription {
    /// The subscribe call itself fails.
    Fail(WaterCrawlError),
    /// The subscription yields these items, then ends.
    Events(Vec<Result<CrawlEvent>>),
}

/// Record of a call made to the mock API.
#[derive(Debug, Clone, PartialEq)]
pub enum MockApiCall {
    List { page_size: u32 },
    Create { url: String },
    Monitor { crawl_id: String },
    Results { crawl_id: String, page: u32 },
}

/// A mock WaterCrawl API with scripted responses.
///
/// Subscriptions are consumed in order; once exhausted, further subscriptions
/// yield an empty stream. Stored results are served in pages of the
/// requested size.
#[derive(Default)]
pub struct MockCrawlApi {
    crawl_id: Arc<RwLock<Option<String>>>,
    create_error: Arc<RwLock<Option<WaterCrawlError>>>,
    list_error: Arc<RwLock<Option<WaterCrawlError>>>,
    subscriptions: Arc<RwLock<VecDeque<Subscription>>>,
    stored_results: Arc<RwLock<Vec<CrawlResultRecord>>>,
    results_error: Arc<RwLock<Option<WaterCrawlError>>>,
    looping_results: Arc<RwLock<bool>>,
    calls: Arc<RwLock<Vec<MockApiCall>>>,
}

impl MockCrawlApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crawl_id(self, crawl_id: impl Into<String>) -> Self {
        *self.crawl_id.write().unwrap() = Some(crawl_id.into());
        self
    }

    /// Fail the next create call.
    pub fn with_create_error(self, error: WaterCrawlError) -> Self {
        *self.create_error.write().unwrap() = Some(error);
        self
    }

    /// Fail the next list call.
    pub fn with_list_error(self, error: WaterCrawlError) -> Self {
        *self.list_error.write().unwrap() = Some(error);
        self
    }

    pub fn with_subscription(self, events: Vec<Result<CrawlEvent>>) -> Self {
        self.subscriptions
            .write()
            .unwrap()
            .push_back(Subscription::Events(events));
        self
    }

    pub fn with_failed_subscription(self, error: WaterCrawlError) -> Self {
        self.subscriptions
            .write()
            .unwrap()
            .push_back(Subscription::Fail(error));
        self
    }

    /// Results served by the paginated listing.
    pub fn with_stored_results(self, records: Vec<CrawlResultRecord>) -> Self {
        *self.stored_results.write().unwrap() = records;
        self
    }

    /// Fail the next results listing call.
    pub fn with_results_error(self, error: WaterCrawlError) -> Self {
        *self.results_error.write().unwrap() = Some(error);
        self
    }

    /// Serve the stored results as a cycle: past the last page the listing
    /// starts over, and `next` is always set.
    pub fn with_looping_results(self) -> Self {
        *self.looping_results.write().unwrap() = true;
        self
    }

    pub fn calls(&self) -> Vec<MockApiCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn create_call_count(&self) -> usize {
        self.count(|c| matches!(c, MockApiCall::Create { .. }))
    }

    pub fn monitor_call_count(&self) -> usize {
        self.count(|c| matches!(c, MockApiCall::Monitor { .. }))
    }

    pub fn results_call_count(&self) -> usize {
        self.count(|c| matches!(c, MockApiCall::Results { .. }))
    }

    fn count(&self, predicate: impl Fn(&MockApiCall) -> bool) -> usize {
        self.calls.read().unwrap().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: MockApiCall) {
        self.calls.write().unwrap().push(call);
    }
}

#[async_trait]
impl CrawlApi for MockCrawlApi {
    async fn list_crawl_requests(&self, page_size: u32) -> Result<Paginated<CrawlRequest>> {
        self.record(MockApiCall::List { page_size });
        if let Some(error) = self.list_error.write().unwrap().take() {
            return Err(error);
        }
        Ok(Paginated {
            count: 0,
            next: None,
            previous: None,
            results: Vec::new(),
        })
    }

    async fn create_crawl_request(&self, request: &CreateCrawlRequest) -> Result<CrawlRequest> {
        self.record(MockApiCall::Create {
            url: request.url.clone(),
        });
        if let Some(error) = self.create_error.write().unwrap().take() {
            return Err(error);
        }

        let uuid = self
            .crawl_id
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "crawl-1".to_string());

        // The service echoes the submitted options
        Ok(CrawlRequest {
            uuid,
            url: Some(request.url.clone()),
            status: CrawlStatus::New,
            options: CrawlOptions {
                spider_options: request.options.spider_options.clone(),
                page_options: request.options.page_options.clone(),
            },
            number_of_documents: None,
            created_at: None,
        })
    }

    async fn monitor_crawl_request(&self, crawl_id: &str, _prefetched: bool) -> Result<EventStream> {
        self.record(MockApiCall::Monitor {
            crawl_id: crawl_id.to_string(),
        });
        let next = self.subscriptions.write().unwrap().pop_front();
        let stream: EventStream = match next {
            Some(Subscription::Fail(error)) => return Err(error),
            Some(Subscription::Events(events)) => Box::pin(futures::stream::iter(events)),
            None => Box::pin(futures::stream::empty::<Result<CrawlEvent>>()),
        };
        Ok(stream)
    }

    async fn get_crawl_request_results(
        &self,
        crawl_id: &str,
        page: u32,
        page_size: u32,
        _prefetched: bool,
    ) -> Result<Paginated<CrawlResultRecord>> {
        self.record(MockApiCall::Results {
            crawl_id: crawl_id.to_string(),
            page,
        });
        if let Some(error) = self.results_error.write().unwrap().take() {
            return Err(error);
        }

        let stored = self.stored_results.read().unwrap();
        let looping = *self.looping_results.read().unwrap();
        let page_size = page_size.max(1) as usize;
        let mut start = (page.max(1) as usize - 1) * page_size;
        if looping && !stored.is_empty() {
            let pages = stored.len().div_ceil(page_size);
            start %= pages * page_size;
        }
        let results: Vec<CrawlResultRecord> =
            stored.iter().skip(start).take(page_size).cloned().collect();
        let next = (looping || start + page_size < stored.len())
            .then(|| format!("?page={}", page + 1));

        Ok(Paginated {
            count: stored.len() as u64,
            next,
            previous: None,
            results,
        })
    }
}

/// A prefetched result record for `url`.
pub fn result_record(url: &str, markdown: &str) -> CrawlResultRecord {
    CrawlResultRecord {
        uuid: None,
        url: url.to_string(),
        result: json!({
            "markdown": markdown,
            "metadata": {"title": markdown}
        }),
        created_at: None,
    }
}

pub fn result_event(url: &str, markdown: &str) -> CrawlEvent {
    CrawlEvent::Result(result_record(url, markdown))
}

pub fn state_event(status: CrawlStatus, number_of_documents: Option<u64>) -> CrawlEvent {
    CrawlEvent::State(CrawlState {
        uuid: None,
        status,
        number_of_documents,
    })
}

pub fn feed_event(message: &str) -> CrawlEvent {
    CrawlEvent::Feed(json!({"message": message}))
}
