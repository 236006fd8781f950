use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WaterCrawlError;

/// Lifecycle status of a crawl request as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CrawlStatus {
    New,
    Running,
    Processing,
    Canceling,
    Canceled,
    Failed,
    Finished,
    Other(String),
}

impl CrawlStatus {
    /// Finished, failed and canceled crawls produce no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Canceled)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "new",
            Self::Running => "running",
            Self::Processing => "processing",
            Self::Canceling => "canceling",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
            Self::Finished => "finished",
            Self::Other(s) => s,
        }
    }
}

impl Default for CrawlStatus {
    fn default() -> Self {
        Self::New
    }
}

impl From<String> for CrawlStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "new" => Self::New,
            "running" => Self::Running,
            "processing" => Self::Processing,
            "canceling" => Self::Canceling,
            "canceled" | "cancelled" => Self::Canceled,
            "failed" => Self::Failed,
            "finished" => Self::Finished,
            _ => Self::Other(s),
        }
    }
}

impl From<CrawlStatus> for String {
    fn from(status: CrawlStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spider options for a crawl request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiderOptions {
    pub max_depth: u32,
    pub page_limit: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_domains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_server: Option<String>,
}

impl Default for SpiderOptions {
    fn default() -> Self {
        Self {
            max_depth: 1,
            page_limit: 1,
            allowed_domains: Vec::new(),
            exclude_paths: Vec::new(),
            include_paths: Vec::new(),
            proxy_server: None,
        }
    }
}

/// Page options for a crawl request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageOptions {
    pub only_main_content: bool,
    pub ignore_rendering: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_headers: BTreeMap<String, String>,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            only_main_content: true,
            ignore_rendering: false,
            exclude_tags: Vec::new(),
            include_tags: Vec::new(),
            locale: None,
            extra_headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlOptions {
    pub spider_options: SpiderOptions,
    pub page_options: PageOptions,
}

/// Body for `POST /crawl-requests/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateCrawlRequest {
    pub url: String,
    pub options: CrawlOptions,
}

impl CreateCrawlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: CrawlOptions::default(),
        }
    }

    pub fn with_spider_options(mut self, spider_options: SpiderOptions) -> Self {
        self.options.spider_options = spider_options;
        self
    }

    pub fn with_page_options(mut self, page_options: PageOptions) -> Self {
        self.options.page_options = page_options;
        self
    }
}

/// A crawl request as stored by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlRequest {
    pub uuid: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: CrawlStatus,
    #[serde(default)]
    pub options: CrawlOptions,
    #[serde(default)]
    pub number_of_documents: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl CrawlRequest {
    /// Number of pages the spider was asked to fetch.
    pub fn page_limit(&self) -> u32 {
        self.options.spider_options.page_limit
    }
}

/// Payload of a `state` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlState {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub status: CrawlStatus,
    #[serde(default)]
    pub number_of_documents: Option<u64>,
}

/// A single crawled page, from a `result` event or the results listing.
///
/// `result` is the raw payload: an object with `markdown` and `metadata` when
/// prefetched, otherwise a link to the stored document.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlResultRecord {
    #[serde(default)]
    pub uuid: Option<String>,
    pub url: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One event from the monitoring stream.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    State(CrawlState),
    Result(CrawlResultRecord),
    Feed(Value),
    Other { kind: String, data: Value },
}

/// Wire shape of a monitoring event: `{"type": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl RawEvent {
    pub(crate) fn into_event(self) -> Result<CrawlEvent, WaterCrawlError> {
        let parse = |kind: &str, e: serde_json::Error| {
            WaterCrawlError::Parse(format!("Invalid {} event: {}", kind, e))
        };
        match self.kind.as_str() {
            "state" => serde_json::from_value(self.data)
                .map(CrawlEvent::State)
                .map_err(|e| parse("state", e)),
            "result" => serde_json::from_value(self.data)
                .map(CrawlEvent::Result)
                .map_err(|e| parse("result", e)),
            "feed" => Ok(CrawlEvent::Feed(self.data)),
            _ => Ok(CrawlEvent::Other {
                kind: self.kind,
                data: self.data,
            }),
        }
    }
}

/// Paginated listing envelope. `next` is `None` on the last page.
#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_terminal() {
        assert!(CrawlStatus::Finished.is_terminal());
        assert!(CrawlStatus::Failed.is_terminal());
        assert!(CrawlStatus::Canceled.is_terminal());
        assert!(!CrawlStatus::Running.is_terminal());
        assert!(!CrawlStatus::from("paused".to_string()).is_terminal());
    }

    #[test]
    fn test_empty_options_are_omitted() {
        let request = CreateCrawlRequest::new("https://a.test");
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({
                "url": "https://a.test",
                "options": {
                    "spider_options": {"max_depth": 1, "page_limit": 1},
                    "page_options": {"only_main_content": true, "ignore_rendering": false}
                }
            })
        );
    }

    #[test]
    fn test_crawl_request_tolerates_missing_options() {
        let request: CrawlRequest = serde_json::from_value(json!({
            "uuid": "abc",
            "status": "new"
        }))
        .unwrap();

        assert_eq!(request.uuid, "abc");
        assert_eq!(request.status, CrawlStatus::New);
        assert_eq!(request.page_limit(), 1);
    }

    #[test]
    fn test_event_variants() {
        let raw: RawEvent = serde_json::from_value(json!({
            "type": "state",
            "data": {"uuid": "abc", "status": "finished", "number_of_documents": 4}
        }))
        .unwrap();
        match raw.into_event().unwrap() {
            CrawlEvent::State(state) => {
                assert_eq!(state.status, CrawlStatus::Finished);
                assert_eq!(state.number_of_documents, Some(4));
            }
            other => panic!("expected state, got {:?}", other),
        }

        let raw: RawEvent =
            serde_json::from_value(json!({"type": "engine", "data": {"x": 1}})).unwrap();
        assert!(matches!(
            raw.into_event().unwrap(),
            CrawlEvent::Other { ref kind, .. } if kind == "engine"
        ));
    }

    #[test]
    fn test_result_without_url_is_parse_error() {
        let raw: RawEvent =
            serde_json::from_value(json!({"type": "result", "data": {"result": {}}})).unwrap();
        assert!(matches!(
            raw.into_event(),
            Err(WaterCrawlError::Parse(_))
        ));
    }
}
